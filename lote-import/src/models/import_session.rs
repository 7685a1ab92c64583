//! Import workflow state and the persisted session snapshot
//!
//! Idle → FileSelected → Parsing → Validating → Preview → Processing →
//! Completed, with Error as the second terminal state. The transition
//! table itself lives in `workflow::transitions`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::activity::{ActivityRecord, ImportMode, RawRow, ValidationError};
use super::import_result::ImportResult;

/// Import workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportState {
    Idle,
    FileSelected,
    Parsing,
    Validating,
    Preview,
    Processing,
    Completed,
    Error,
}

impl ImportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportState::Idle => "IDLE",
            ImportState::FileSelected => "FILE_SELECTED",
            ImportState::Parsing => "PARSING",
            ImportState::Validating => "VALIDATING",
            ImportState::Preview => "PREVIEW",
            ImportState::Processing => "PROCESSING",
            ImportState::Completed => "COMPLETED",
            ImportState::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportState::Completed | ImportState::Error)
    }

    /// States whose arrival writes the session snapshot
    pub fn persists_session(&self) -> bool {
        matches!(
            self,
            ImportState::Parsing
                | ImportState::Validating
                | ImportState::Preview
                | ImportState::Processing
        )
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File chosen by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    /// Display name (file name component)
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl SelectedFile {
    /// Describe a file on disk
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let size_bytes = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            path,
            size_bytes,
        })
    }

    /// Lowercased extension without the dot
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Batch progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub completed: usize,
    pub total: usize,
    /// `completed / total`, 0.0 - 1.0
    pub fraction: f64,
}

/// The single in-flight import, persisted for crash recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: Uuid,
    /// Last update time; drives the freshness window
    pub timestamp: DateTime<Utc>,
    pub state: ImportState,
    pub import_name: String,
    pub file: SelectedFile,
    pub mode: ImportMode,
    pub parsed_rows: Vec<RawRow>,
    pub validated_records: Vec<ActivityRecord>,
    pub parse_errors: Vec<String>,
    pub validation_errors: Vec<ValidationError>,
    pub results: ImportResult,
    pub progress: ImportProgress,
    pub last_error: Option<String>,
}

impl ImportSession {
    pub fn new(file: SelectedFile, import_name: String, mode: ImportMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            state: ImportState::FileSelected,
            import_name,
            file,
            mode,
            parsed_rows: Vec::new(),
            validated_records: Vec::new(),
            parse_errors: Vec::new(),
            validation_errors: Vec::new(),
            results: ImportResult::default(),
            progress: ImportProgress::default(),
            last_error: None,
        }
    }

    /// Older than the freshness window at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.timestamp > ttl
    }

    /// Mark the snapshot as updated now
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }

    /// Validated records that have no recorded outcome yet
    pub fn pending_records(&self) -> Vec<ActivityRecord> {
        self.validated_records
            .iter()
            .filter(|r| !self.results.has_outcome(r.original_line))
            .cloned()
            .collect()
    }

    pub fn update_progress(&mut self, completed: usize, total: usize) {
        self.progress.completed = completed;
        self.progress.total = total;
        self.progress.fraction = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };
    }
}
