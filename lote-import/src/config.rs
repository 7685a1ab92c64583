//! Configuration resolution for lote-import
//!
//! Turns the `[import]` and `[remote]` TOML sections into typed settings and
//! resolves login credentials with CLI → ENV → TOML priority.

use std::time::Duration;

use lote_common::config::TomlConfig;
use tracing::{info, warn};

use crate::error::ImportError;
use crate::models::WorkItemType;

/// Environment variable carrying the login identity
pub const IDENTITY_ENV_VAR: &str = "LOTE_IDENTITY";
/// Environment variable carrying the login secret
pub const SECRET_ENV_VAR: &str = "LOTE_SECRET";

/// Typed import settings
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    pub max_file_bytes: u64,
    /// Lowercase, without the dot
    pub allowed_extensions: Vec<String>,
    /// Delay between consecutive remote calls
    pub pacing: Duration,
    pub session_ttl: chrono::Duration,
    pub history_limit: usize,
    pub enabled_types: Vec<WorkItemType>,
    pub roster: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

impl ImportConfig {
    /// Build from the TOML sections
    ///
    /// Unknown names in `enabled_types` are dropped with a warning. An empty
    /// list enables every type.
    pub fn from_toml(config: &TomlConfig) -> Self {
        let settings = &config.import;

        let mut enabled_types = Vec::new();
        for name in &settings.enabled_types {
            match name.parse::<WorkItemType>() {
                Ok(kind) if !enabled_types.contains(&kind) => enabled_types.push(kind),
                Ok(_) => {}
                Err(e) => warn!("Ignoring enabled type '{}': {}", name, e),
            }
        }
        if enabled_types.is_empty() {
            enabled_types = WorkItemType::ALL.to_vec();
        }

        Self {
            max_file_bytes: settings.max_file_bytes,
            allowed_extensions: settings
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            pacing: Duration::from_millis(settings.pacing_ms),
            session_ttl: chrono::Duration::hours(settings.session_ttl_hours),
            history_limit: settings.history_limit.max(1),
            enabled_types,
            roster: settings.roster.clone(),
        }
    }

    /// Same settings with no pacing delay
    pub fn without_pacing(mut self) -> Self {
        self.pacing = Duration::ZERO;
        self
    }
}

/// Login credentials for the remote service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// Both parts present and non-blank
    pub fn is_complete(&self) -> bool {
        is_present(&self.identity) && is_present(&self.secret)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"***")
            .finish()
    }
}

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

fn pick(
    what: &str,
    candidates: [(&'static str, Option<String>); 3],
) -> Option<String> {
    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, v)| v.as_deref().is_some_and(is_present))
        .map(|(name, _)| *name)
        .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            what,
            sources.join(", "),
            sources[0]
        );
    }

    for (source, value) in candidates {
        if let Some(value) = value.filter(|v| is_present(v)) {
            info!("{} loaded from {}", what, source);
            return Some(value);
        }
    }
    None
}

/// Resolve credentials
///
/// **Priority:** CLI → ENV → TOML. The secret is never read from TOML.
pub fn resolve_credentials(
    cli_identity: Option<String>,
    cli_secret: Option<String>,
    toml_config: &TomlConfig,
) -> Result<Credentials, ImportError> {
    let identity = pick(
        "Identity",
        [
            ("command line", cli_identity),
            ("environment", std::env::var(IDENTITY_ENV_VAR).ok()),
            ("TOML config", toml_config.remote.identity.clone()),
        ],
    );
    let secret = pick(
        "Secret",
        [
            ("command line", cli_secret),
            ("environment", std::env::var(SECRET_ENV_VAR).ok()),
            ("TOML config", None),
        ],
    );

    match (identity, secret) {
        (Some(identity), Some(secret)) => Ok(Credentials::new(identity, secret)),
        _ => Err(ImportError::MissingCredentials),
    }
}
