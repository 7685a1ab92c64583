//! Data model for the import pipeline

pub mod activity;
pub mod import_result;
pub mod import_session;

pub use activity::{ActivityRecord, ImportMode, RawRow, ValidationError, WorkItemType};
pub use import_result::{HistoryEntry, HistoryStatus, ImportFailure, ImportResult, ImportSuccess};
pub use import_session::{ImportProgress, ImportSession, ImportState, SelectedFile};
