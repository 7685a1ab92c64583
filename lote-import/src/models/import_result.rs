//! Import outcomes and history entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::{RawRow, ValidationError};

/// A record the remote service accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSuccess {
    pub line: usize,
    pub title: String,
    #[serde(default)]
    pub kind: String,
    pub remote_id: String,
    pub remote_uid: String,
}

/// A record that was rejected, remotely or by validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub line: usize,
    pub title: String,
    #[serde(default)]
    pub kind: String,
    pub message: String,
}

/// Outcome of one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: Vec<ImportSuccess>,
    pub errors: Vec<ImportFailure>,
    pub total: usize,
}

impl ImportResult {
    pub fn new(total: usize) -> Self {
        Self {
            success: Vec::new(),
            errors: Vec::new(),
            total,
        }
    }

    pub fn success_count(&self) -> usize {
        self.success.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether a record from this source line already has an outcome
    pub fn has_outcome(&self, line: usize) -> bool {
        self.success.iter().any(|s| s.line == line) || self.errors.iter().any(|e| e.line == line)
    }

    /// Fold row-level validation findings into the error list
    ///
    /// Findings for the same line collapse into one entry. The title and
    /// type come from the raw row when it is still available.
    pub fn merge_validation_errors(&mut self, findings: &[ValidationError], rows: &[RawRow]) {
        let mut lines: Vec<usize> = findings.iter().map(|f| f.line).collect();
        lines.sort_unstable();
        lines.dedup();

        for line in lines {
            if self.errors.iter().any(|e| e.line == line) {
                continue;
            }
            let message = findings
                .iter()
                .filter(|f| f.line == line)
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let row = rows.iter().find(|r| r.original_line == line);
            self.errors.push(ImportFailure {
                line,
                title: row
                    .and_then(|r| r.value("titulo"))
                    .unwrap_or_default()
                    .to_string(),
                kind: row
                    .and_then(|r| r.value("tipo"))
                    .unwrap_or_default()
                    .to_string(),
                message,
            });
        }

        self.finalize();
    }

    /// Order both lists by source line and recount the total
    pub fn finalize(&mut self) {
        self.success.sort_by_key(|s| s.line);
        self.errors.sort_by_key(|e| e.line);
        self.total = self.success.len() + self.errors.len();
    }
}

/// Terminal outcome recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    /// The batch ran to completion (possibly with per-record failures)
    Completed,
    /// The file was structurally invalid; nothing reached the remote service
    ParseError,
    /// No row survived validation; nothing reached the remote service
    ValidationError,
    /// Execution aborted, e.g. authentication failed
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Completed => "completed",
            HistoryStatus::ParseError => "parse_error",
            HistoryStatus::ValidationError => "validation_error",
            HistoryStatus::Error => "error",
        }
    }

    /// Whether any remote call was attempted for this outcome
    pub fn reached_remote(&self) -> bool {
        matches!(self, HistoryStatus::Completed)
    }
}

/// Immutable snapshot of a finished import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub import_name: String,
    pub total_activities: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub results: ImportResult,
    pub status: HistoryStatus,
}

impl HistoryEntry {
    pub fn new(import_name: impl Into<String>, results: ImportResult, status: HistoryStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            import_name: import_name.into(),
            total_activities: results.total,
            success_count: results.success_count(),
            error_count: results.error_count(),
            results,
            status,
        }
    }
}
