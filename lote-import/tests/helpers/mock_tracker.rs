//! Scripted in-process remote tracker

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lote_import::remote::{AuthToken, CreatedActivity, RemoteActivity, RemoteError, RemoteTracker};

/// One activity call as seen by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub title: String,
    /// `Some(remote_id)` for updates
    pub updated_id: Option<String>,
    pub token: String,
}

/// Tracker whose answers are scripted per test
///
/// Logins succeed unless a scripted login failure is queued. Activity calls
/// succeed unless a failure is queued for that title; each queued failure is
/// used once.
#[derive(Default)]
pub struct ScriptedTracker {
    login_failures: Mutex<VecDeque<RemoteError>>,
    title_failures: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    calls: Mutex<Vec<Call>>,
    logins: AtomicUsize,
    next_id: AtomicUsize,
    call_delay: Option<Duration>,
}

impl ScriptedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_login(self, error: RemoteError) -> Self {
        self.login_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn fail_title(self, title: &str, error: RemoteError) -> Self {
        self.title_failures
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default()
            .push_back(error);
        self
    }

    /// Make every activity call take this long
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.title).collect()
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        token: &AuthToken,
        updated_id: Option<&str>,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        self.calls.lock().unwrap().push(Call {
            title: activity.titulo.clone(),
            updated_id: updated_id.map(str::to_string),
            token: token.as_str().to_string(),
        });

        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .title_failures
            .lock()
            .unwrap()
            .get_mut(&activity.titulo)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        let id = match updated_id {
            Some(id) => id.to_string(),
            None => (self.next_id.fetch_add(1, Ordering::SeqCst) + 100).to_string(),
        };
        Ok(CreatedActivity {
            uid: format!("uid-{}", id),
            id,
            title: activity.titulo.clone(),
        })
    }
}

#[async_trait]
impl RemoteTracker for ScriptedTracker {
    async fn authenticate(&self, identity: &str, _secret: &str) -> Result<AuthToken, RemoteError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = self.login_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(AuthToken::new(format!("{}-token-{}", identity, n)))
    }

    async fn create_activity(
        &self,
        token: &AuthToken,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        self.answer(token, None, activity).await
    }

    async fn update_activity(
        &self,
        token: &AuthToken,
        remote_id: &str,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        self.answer(token, Some(remote_id), activity).await
    }
}
