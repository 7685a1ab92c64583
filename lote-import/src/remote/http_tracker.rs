//! HTTP client for the work-tracking service
//!
//! `POST {base}/auth` returns `{token}`; `POST {base}/activities` and
//! `PUT {base}/activities/{id}` take a bearer token and return
//! `{id, uid, title}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AuthToken, CreatedActivity, RemoteActivity, RemoteError, RemoteTracker};

const USER_AGENT: &str = concat!("lote-import/", env!("CARGO_PKG_VERSION"));
/// Non-standard "login time-out" status; the login flow must be restarted
const LOGIN_TIMEOUT: u16 = 440;

#[derive(Serialize)]
struct AuthRequest<'a> {
    identity: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

/// Error body the service may send; both keys are seen in the wild
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// reqwest-backed [`RemoteTracker`]
pub struct HttpTracker {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTracker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_activity(
        &self,
        request: reqwest::RequestBuilder,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        let response = request
            .json(activity)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::AuthExpired);
        }
        if !status.is_success() {
            return Err(RemoteError::Remote {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        response
            .json::<CreatedActivity>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Best-effort human message from an error response
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        if let Some(message) = body.message.or(body.error) {
            return message;
        }
    }
    if text.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("erro desconhecido")
            .to_string()
    } else {
        text.trim().to_string()
    }
}

#[async_trait]
impl RemoteTracker for HttpTracker {
    async fn authenticate(&self, identity: &str, secret: &str) -> Result<AuthToken, RemoteError> {
        let url = format!("{}/auth", self.base_url);
        debug!(url = %url, identity = %identity, "Authenticating");

        let response = self
            .http_client
            .post(&url)
            .json(&AuthRequest { identity, secret })
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::AuthRejected(error_message(response).await));
        }
        if status.as_u16() == LOGIN_TIMEOUT {
            return Err(RemoteError::AuthExpired);
        }
        if !status.is_success() {
            return Err(RemoteError::Remote {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(AuthToken::new(body.token))
    }

    async fn create_activity(
        &self,
        token: &AuthToken,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        let url = format!("{}/activities", self.base_url);
        debug!(url = %url, title = %activity.titulo, "Creating activity");

        let request = self.http_client.post(&url).bearer_auth(token.as_str());
        self.send_activity(request, activity).await
    }

    async fn update_activity(
        &self,
        token: &AuthToken,
        remote_id: &str,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError> {
        let url = format!("{}/activities/{}", self.base_url, remote_id);
        debug!(url = %url, title = %activity.titulo, "Updating activity");

        let request = self.http_client.put(&url).bearer_auth(token.as_str());
        self.send_activity(request, activity).await
    }
}
