//! Remote work-tracking service boundary
//!
//! The import core only sees the [`RemoteTracker`] trait. Failures come back
//! already classified as [`RemoteError`] so the executor can tell an expired
//! login (retry once) from everything else without looking at messages.

pub mod http_tracker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ActivityRecord;

pub use http_tracker::HttpTracker;

/// Classified remote failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The login token is no longer accepted; re-authenticating may help
    #[error("Sessão expirada no serviço remoto")]
    AuthExpired,

    /// Identity or secret refused
    #[error("Credenciais recusadas: {0}")]
    AuthRejected(String),

    /// The service answered with an error
    #[error("Erro remoto {status}: {message}")]
    Remote { status: u16, message: String },

    /// The service could not be reached
    #[error("Erro de rede: {0}")]
    Network(String),

    /// The answer could not be understood
    #[error("Resposta inválida: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, RemoteError::AuthExpired)
    }
}

/// Bearer token returned by a successful login
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Work item in the shape the remote service expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteActivity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    pub titulo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgencia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plataforma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo_cliente: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticidade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dificuldade_localizacao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causa_raiz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garantia: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_ticket: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_organizacao: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsavel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esforco_estimado: Option<f64>,
    /// `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_inicio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_fim: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_conta: Option<String>,
    /// Columns outside the fixed schema
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub extras: std::collections::BTreeMap<String, String>,
}

impl From<&ActivityRecord> for RemoteActivity {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            tipo: record.kind.map(|k| k.to_string()),
            titulo: record.title.clone(),
            descricao: record.description.clone(),
            categoria: record.category.clone(),
            subcategoria: record.sub_category.clone(),
            urgencia: record.urgency.clone(),
            plataforma: record.platform.clone(),
            tipo_cliente: record.client_type.clone(),
            criticidade: record.criticality.clone(),
            dificuldade_localizacao: record.localization_difficulty.clone(),
            causa_raiz: record.root_cause.clone(),
            garantia: record.warranty.as_deref().map(|w| w == "Sim"),
            id_ticket: record.ticket_id,
            id_organizacao: record.organization_id,
            responsavel: record.responsible.clone(),
            email: record.email.clone(),
            esforco_estimado: record.estimated_effort,
            data_inicio: record.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            data_fim: record.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            id_conta: record.account_id.clone(),
            extras: record.extra.clone(),
        }
    }
}

/// What the service returns for a created or updated work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedActivity {
    pub id: String,
    pub uid: String,
    #[serde(default)]
    pub title: String,
}

/// Remote work-tracking capability
#[async_trait]
pub trait RemoteTracker: Send + Sync {
    /// Log in; fails with `AuthRejected` or `AuthExpired`
    async fn authenticate(&self, identity: &str, secret: &str) -> Result<AuthToken, RemoteError>;

    /// Create one work item
    async fn create_activity(
        &self,
        token: &AuthToken,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError>;

    /// Overwrite an existing work item
    async fn update_activity(
        &self,
        token: &AuthToken,
        remote_id: &str,
        activity: &RemoteActivity,
    ) -> Result<CreatedActivity, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkItemType;
    use chrono::NaiveDate;

    #[test]
    fn test_remote_shape_from_record() {
        let record = ActivityRecord {
            original_line: 4,
            kind: Some(WorkItemType::Correcao),
            title: "Corrigir cálculo".to_string(),
            warranty: Some("Não".to_string()),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            ..ActivityRecord::default()
        };

        let json = serde_json::to_value(RemoteActivity::from(&record)).unwrap();
        assert_eq!(json["tipo"], "Correcao");
        assert_eq!(json["titulo"], "Corrigir cálculo");
        assert_eq!(json["garantia"], false);
        assert_eq!(json["data_inicio"], "2024-01-05");
        assert!(json.get("descricao").is_none());
        assert!(json.get("extras").is_none());
    }

    #[test]
    fn test_only_expiry_is_retryable() {
        assert!(RemoteError::AuthExpired.is_auth_expired());
        assert!(!RemoteError::AuthRejected("x".into()).is_auth_expired());
        assert!(!RemoteError::Remote {
            status: 500,
            message: "token expired".into()
        }
        .is_auth_expired());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", AuthToken::new("abc")), "AuthToken(***)");
    }
}
