//! Batch executor
//!
//! Authenticates once, then sends validated records to the remote service
//! strictly one at a time. A failed record is recorded and the loop moves
//! on; only a failed login aborts the run. Consecutive calls are separated
//! by the pacing delay. Every remote call and every delay races the
//! cancellation token, and a result that arrives after cancellation is
//! dropped.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use lote_common::events::{EventBus, ImportEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::db::SessionStore;
use crate::error::ImportError;
use crate::models::{ActivityRecord, ImportFailure, ImportMode, ImportSession, ImportSuccess};
use crate::remote::{AuthToken, CreatedActivity, RemoteActivity, RemoteError, RemoteTracker};

/// Minimum gap between the end of one remote call and the start of the next
pub struct Pacer {
    interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    /// Wait out the remaining gap; returns `false` if cancelled meanwhile
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let Some(last) = self.last_call else {
            return true;
        };
        let elapsed = last.elapsed();
        if elapsed >= self.interval {
            return true;
        }

        let remaining = self.interval - elapsed;
        debug!("Pacing: waiting {:?}", remaining);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(remaining) => true,
        }
    }

    /// Note that a call just finished
    pub fn mark(&mut self) {
        self.last_call = Some(Instant::now());
    }
}

/// Sequential remote executor for one import session
pub struct BatchExecutor<'a> {
    tracker: &'a dyn RemoteTracker,
    sessions: &'a dyn SessionStore,
    events: &'a EventBus,
    pacing: Duration,
    cancel: CancellationToken,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(
        tracker: &'a dyn RemoteTracker,
        sessions: &'a dyn SessionStore,
        events: &'a EventBus,
        pacing: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tracker,
            sessions,
            events,
            pacing,
            cancel,
        }
    }

    /// `None` when cancelled before `fut` finished
    async fn or_cancel<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Log in, retrying exactly once on an expired-login answer
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, ImportError> {
        let login = || self.tracker.authenticate(&credentials.identity, &credentials.secret);

        match self.or_cancel(login()).await.ok_or(ImportError::Cancelled)? {
            Ok(token) => Ok(token),
            Err(e) if e.is_auth_expired() => {
                warn!("Login expired during authentication; retrying once");
                self.or_cancel(login())
                    .await
                    .ok_or(ImportError::Cancelled)?
                    .map_err(ImportError::Authentication)
            }
            Err(e) => Err(ImportError::Authentication(e)),
        }
    }

    async fn call(
        &self,
        token: &AuthToken,
        mode: ImportMode,
        record: &ActivityRecord,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        match mode {
            ImportMode::Create => self.tracker.create_activity(token, activity).await,
            ImportMode::Update => match record.remote_id.as_deref() {
                Some(remote_id) => self.tracker.update_activity(token, remote_id, activity).await,
                // Never sent; validation requires the id in update mode
                None => Err(RemoteError::Remote {
                    status: 422,
                    message: "id_atividade ausente".to_string(),
                }),
            },
        }
    }

    /// Send one record; on an expired login re-authenticate and retry once
    ///
    /// `None` means the run was cancelled and nothing may be recorded.
    async fn submit(
        &self,
        token: &mut AuthToken,
        mode: ImportMode,
        record: &ActivityRecord,
        credentials: &Credentials,
    ) -> Option<Result<CreatedActivity, RemoteError>> {
        let activity = RemoteActivity::from(record);

        let first = self.or_cancel(self.call(token, mode, record, &activity)).await?;
        match first {
            Err(e) if e.is_auth_expired() => {
                warn!(line = record.original_line, "Login expired; re-authenticating once");
                let login = self
                    .tracker
                    .authenticate(&credentials.identity, &credentials.secret);
                match self.or_cancel(login).await? {
                    Ok(fresh) => {
                        *token = fresh;
                        self.or_cancel(self.call(token, mode, record, &activity))
                            .await
                    }
                    Err(e) => Some(Err(e)),
                }
            }
            outcome => Some(outcome),
        }
    }

    /// Process every record of `session` that has no outcome yet
    ///
    /// Outcomes are appended to `session.results` and the snapshot is saved
    /// after each record.
    pub async fn run(
        &self,
        session: &mut ImportSession,
        credentials: &Credentials,
    ) -> Result<(), ImportError> {
        let mut token = self.authenticate(credentials).await?;
        info!(session_id = %session.id, "Authenticated with remote service");

        let pending = session.pending_records();
        let total = session.validated_records.len();
        let mut completed = total - pending.len();
        let mut pacer = Pacer::new(self.pacing);

        for record in &pending {
            if !pacer.wait(&self.cancel).await {
                return Err(ImportError::Cancelled);
            }

            let outcome = self
                .submit(&mut token, session.mode, record, credentials)
                .await
                .ok_or(ImportError::Cancelled)?;
            pacer.mark();

            match outcome {
                Ok(created) => {
                    debug!(line = record.original_line, remote_id = %created.id, "Record sent");
                    self.events.emit_lossy(ImportEvent::RecordCreated {
                        session_id: session.id,
                        line: record.original_line,
                        remote_id: created.id.clone(),
                    });
                    session.results.success.push(ImportSuccess {
                        line: record.original_line,
                        title: if created.title.is_empty() {
                            record.title.clone()
                        } else {
                            created.title
                        },
                        kind: record.kind_label(),
                        remote_id: created.id,
                        remote_uid: created.uid,
                    });
                }
                Err(e) => {
                    warn!(line = record.original_line, error = %e, "Record rejected by remote service");
                    self.events.emit_lossy(ImportEvent::RecordFailed {
                        session_id: session.id,
                        line: record.original_line,
                        message: e.to_string(),
                    });
                    session.results.errors.push(ImportFailure {
                        line: record.original_line,
                        title: record.title.clone(),
                        kind: record.kind_label(),
                        message: e.to_string(),
                    });
                }
            }

            completed += 1;
            session.update_progress(completed, total);
            self.events.emit_lossy(ImportEvent::Progress {
                session_id: session.id,
                completed,
                total,
                fraction: session.progress.fraction,
                timestamp: Utc::now(),
            });

            session.touch();
            if let Err(e) = self.sessions.save(session).await {
                warn!(error = %e, "Failed to persist session progress");
            }
        }

        info!(
            session_id = %session.id,
            successes = session.results.success_count(),
            errors = session.results.error_count(),
            "Batch finished"
        );
        Ok(())
    }
}
