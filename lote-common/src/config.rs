//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting that can come from several places:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and compiled
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LOTE_CONFIG";
/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "LOTE_ROOT_FOLDER";
/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "lote.db";

/// Contents of `lote.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database (session slot and history)
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub remote: RemoteConfig,
    pub import: ImportSettings,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[remote]` section: the work-tracking service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Login identity. The secret is never read from TOML.
    pub identity: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            timeout_secs: 30,
            identity: None,
        }
    }
}

/// `[import]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportSettings {
    /// Upper bound on the selected file size in bytes
    pub max_file_bytes: u64,
    /// Accepted file extensions, lowercase, without the dot
    pub allowed_extensions: Vec<String>,
    /// Delay between consecutive remote calls
    pub pacing_ms: u64,
    /// Freshness window of a persisted session
    pub session_ttl_hours: i64,
    /// Maximum number of history entries kept
    pub history_limit: usize,
    /// Work-item types accepted by the validator. Empty means all types.
    pub enabled_types: Vec<String>,
    /// Known responsible-party names
    pub roster: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            allowed_extensions: vec!["csv".to_string(), "txt".to_string()],
            pacing_ms: 500,
            session_ttl_hours: 24,
            history_limit: 10,
            enabled_types: Vec::new(),
            roster: Vec::new(),
        }
    }
}

/// Locate the config file: CLI argument, then `LOTE_CONFIG`, then the
/// per-user config directory. Returns `None` when no candidate exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    match default_config_path() {
        Some(path) if path.exists() => Some(path),
        _ => None,
    }
}

/// Per-user config file location, whether or not it exists
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lote").join("lote.toml"))
}

/// Load `lote.toml`, falling back to defaults when the file is absent
///
/// A file that exists but cannot be parsed is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        debug!("No config file located, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolves the root folder holding `lote.db`
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            toml_root: config.root_folder.clone(),
        }
    }

    /// Resolve using CLI → `LOTE_ROOT_FOLDER` → TOML → OS default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lote"))
        .unwrap_or_else(|| PathBuf::from("./lote_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}
