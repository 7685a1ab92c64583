//! Import workflow
//!
//! [`ImportWorkflow`] owns the single in-flight [`ImportSession`] and walks
//! it through the state machine in [`transitions`]. Persistence, the remote
//! tracker and the event bus are injected through the constructor.
//!
//! Landing in Parsing, Validating, Preview or Processing saves the session
//! snapshot. Every terminal outcome is written to history, after which the
//! persisted snapshot is cleared.

pub mod executor;
pub mod transitions;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lote_common::events::{EventBus, ImportEvent};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Credentials, ImportConfig};
use crate::db::{HistoryStore, ImportHistory, SessionStore};
use crate::error::ImportError;
use crate::models::{
    HistoryEntry, HistoryStatus, ImportFailure, ImportMode, ImportResult, ImportSession,
    ImportState, SelectedFile,
};
use crate::parser;
use crate::remote::RemoteTracker;
use crate::report::write_report;
use crate::validator::{validate, ValidationContext};

pub use executor::{BatchExecutor, Pacer};
pub use transitions::{next_state, Trigger};

/// What `restore` found in the session slot
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// A fresh session was restored in `state`
    Restored {
        state: ImportState,
        saved_at: DateTime<Utc>,
        pending: usize,
    },
    /// The saved session was older than the freshness window
    Discarded { saved_at: DateTime<Utc> },
}

pub struct ImportWorkflow {
    config: ImportConfig,
    sessions: Arc<dyn SessionStore>,
    history: ImportHistory,
    tracker: Arc<dyn RemoteTracker>,
    events: EventBus,
    state: ImportState,
    session: Option<ImportSession>,
    cancel: CancellationToken,
    last_error: Option<String>,
}

impl ImportWorkflow {
    /// Create an idle workflow; loads the history list
    pub async fn new(
        config: ImportConfig,
        sessions: Arc<dyn SessionStore>,
        history_store: Arc<dyn HistoryStore>,
        tracker: Arc<dyn RemoteTracker>,
        events: EventBus,
    ) -> Result<Self, ImportError> {
        let history = ImportHistory::load(history_store, config.history_limit).await?;

        Ok(Self {
            config,
            sessions,
            history,
            tracker,
            events,
            state: ImportState::Idle,
            session: None,
            cancel: CancellationToken::new(),
            last_error: None,
        })
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn session(&self) -> Option<&ImportSession> {
        self.session.as_ref()
    }

    /// Message of the failure that put the workflow in `Error`
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn history(&self) -> &ImportHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut ImportHistory {
        &mut self.history
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Token that aborts the running import when cancelled
    ///
    /// A cancelled run discards in-flight results and resets to Idle.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Report of the current session's results
    pub fn report(&self) -> Result<String, ImportError> {
        let results = self
            .session
            .as_ref()
            .map(|s| s.results.clone())
            .unwrap_or_default();
        write_report(&results)
    }

    // ========================================================================
    // State handling
    // ========================================================================

    fn current(&self, operation: &'static str) -> Result<&ImportSession, ImportError> {
        self.session.as_ref().ok_or(ImportError::InvalidTransition {
            from: self.state,
            operation,
        })
    }

    fn ensure_allowed(&self, trigger: Trigger, operation: &'static str) -> Result<(), ImportError> {
        match next_state(self.state, trigger) {
            Some(_) => Ok(()),
            None => Err(ImportError::InvalidTransition {
                from: self.state,
                operation,
            }),
        }
    }

    /// Apply a trigger: update state, log, publish, persist when required
    async fn apply(&mut self, trigger: Trigger, operation: &'static str) -> Result<(), ImportError> {
        let new_state = next_state(self.state, trigger).ok_or(ImportError::InvalidTransition {
            from: self.state,
            operation,
        })?;
        let old_state = self.state;
        self.state = new_state;

        let session_id = self.session.as_ref().map(|s| s.id);
        info!(
            session_id = ?session_id,
            "Import state: {} → {}", old_state, new_state
        );
        self.events.emit_lossy(ImportEvent::StateChanged {
            session_id,
            old_state: old_state.to_string(),
            new_state: new_state.to_string(),
            timestamp: Utc::now(),
        });

        if let Some(session) = self.session.as_mut() {
            session.state = new_state;
            session.touch();
            if new_state.persists_session() {
                self.sessions.save(session).await?;
            }
        }
        Ok(())
    }

    /// Record a terminal outcome; storage trouble is logged, not returned
    async fn record_outcome(&mut self, status: HistoryStatus) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let entry = HistoryEntry::new(session.import_name.clone(), session.results.clone(), status);

        if let Err(e) = self.history.record(entry).await {
            warn!(error = %e, "Failed to record import history");
        }
        if let Err(e) = self.sessions.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    async fn fail(&mut self, trigger: Trigger, operation: &'static str, message: String) -> Result<(), ImportError> {
        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(message.clone());
        }
        self.last_error = Some(message);
        self.apply(trigger, operation).await
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Check a file and open a new session for it
    ///
    /// Any previous session is dropped. A file with a disallowed extension
    /// or above the size ceiling moves the workflow to Error without
    /// creating a session.
    pub async fn select_file(
        &mut self,
        path: impl AsRef<Path>,
        mode: ImportMode,
    ) -> Result<&ImportSession, ImportError> {
        const OP: &str = "select_file";
        self.ensure_allowed(Trigger::FileAccepted, OP)?;

        self.session = None;
        self.last_error = None;
        self.sessions.clear().await?;

        let path = path.as_ref();
        let checked = SelectedFile::from_path(path)
            .map_err(|e| format!("{}: {}", path.display(), e))
            .and_then(|file| self.check_file(file));

        let file = match checked {
            Ok(file) => file,
            Err(message) => {
                warn!(path = %path.display(), "File rejected: {}", message);
                self.fail(Trigger::FileRejected, OP, message.clone()).await?;
                return Err(ImportError::FileSelection(message));
            }
        };

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let name = default_import_name(&file);
        info!(file = %file.name, bytes = file.size_bytes, mode = ?mode, "File selected");
        self.session = Some(ImportSession::new(file, name, mode));
        self.apply(Trigger::FileAccepted, OP).await?;

        self.current(OP)
    }

    fn check_file(&self, file: SelectedFile) -> Result<SelectedFile, String> {
        let extension = file.extension().unwrap_or_default();
        if !self.config.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(format!(
                "Extensão '{}' não permitida. Use: {}",
                extension,
                self.config.allowed_extensions.join(", ")
            ));
        }
        if file.size_bytes > self.config.max_file_bytes {
            return Err(format!(
                "Arquivo com {} bytes excede o limite de {} bytes",
                file.size_bytes, self.config.max_file_bytes
            ));
        }
        Ok(file)
    }

    /// Rename the current import before processing
    pub fn set_import_name(&mut self, name: impl Into<String>) {
        if let Some(session) = self.session.as_mut() {
            session.import_name = name.into();
        }
    }

    /// Read, parse and validate the selected file
    ///
    /// Ends in Preview when at least one record is valid. Structural errors
    /// and all-invalid files end in Error and are written to history.
    pub async fn process_file(&mut self) -> Result<&ImportSession, ImportError> {
        const OP: &str = "process_file";
        self.ensure_allowed(Trigger::BeginParse, OP)?;
        let path = self.current(OP)?.file.path.clone();

        self.apply(Trigger::BeginParse, OP).await?;

        let parsed = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parser::parse(&content),
            Err(e) => parser::ParseOutcome {
                rows: Vec::new(),
                errors: vec![format!("Não foi possível ler o arquivo: {}", e)],
            },
        };

        if !parsed.errors.is_empty() {
            error!(errors = parsed.errors.len(), "File could not be parsed");
            if let Some(session) = self.session.as_mut() {
                session.parse_errors = parsed.errors.clone();
                session.results = ImportResult::new(0);
                session.results.errors = parsed
                    .errors
                    .iter()
                    .map(|message| ImportFailure {
                        line: 0,
                        title: String::new(),
                        kind: String::new(),
                        message: message.clone(),
                    })
                    .collect();
                session.results.finalize();
            }
            self.fail(Trigger::ParseFailed, OP, parsed.errors.join("; ")).await?;
            self.record_outcome(HistoryStatus::ParseError).await;
            return Err(ImportError::Parse(parsed.errors));
        }

        let mode = match self.session.as_mut() {
            Some(session) => {
                session.parsed_rows = parsed.rows;
                session.mode
            }
            None => ImportMode::default(),
        };
        self.apply(Trigger::Parsed, OP).await?;

        let ctx = ValidationContext::new(mode, &self.config);
        let mut valid_count = 0;
        let mut rejected = 0;
        if let Some(session) = self.session.as_mut() {
            let outcome = validate(&session.parsed_rows, &ctx);
            let mut results = ImportResult::new(0);
            results.merge_validation_errors(&outcome.errors, &session.parsed_rows);

            valid_count = outcome.valid_activities.len();
            rejected = results.error_count();
            session.validated_records = outcome.valid_activities;
            session.validation_errors = outcome.errors;
            session.results = results;
            session.parsed_rows.clear();
            session.update_progress(0, valid_count);
        }
        info!(valid = valid_count, rejected, "File validated");

        if valid_count == 0 {
            self.fail(
                Trigger::NoValidRecords,
                OP,
                format!("Nenhum registro válido ({} linha(s) com erro)", rejected),
            )
            .await?;
            self.record_outcome(HistoryStatus::ValidationError).await;
            return Err(ImportError::NoValidRecords { errors: rejected });
        }

        self.apply(Trigger::Validated, OP).await?;
        self.current(OP)
    }

    /// Send the validated records to the remote service
    ///
    /// Missing credentials fail without a state change. A failed login ends
    /// in Error with nothing sent. Otherwise every pending record is
    /// attempted and the run ends in Completed, whatever the per-record
    /// outcomes.
    pub async fn execute_import(
        &mut self,
        credentials: &Credentials,
    ) -> Result<&ImportResult, ImportError> {
        const OP: &str = "execute_import";
        self.ensure_allowed(Trigger::BeginProcessing, OP)?;
        if !credentials.is_complete() {
            return Err(ImportError::MissingCredentials);
        }
        let pending = match self.session.as_mut() {
            Some(session) => {
                let total = session.validated_records.len();
                let pending = session.pending_records().len();
                session.update_progress(total - pending, total);
                pending
            }
            None => 0,
        };
        if pending == 0 {
            return Err(ImportError::NothingToImport);
        }
        self.apply(Trigger::BeginProcessing, OP).await?;

        let Some(mut session) = self.session.take() else {
            return Err(ImportError::NothingToImport);
        };
        let executor = BatchExecutor::new(
            self.tracker.as_ref(),
            self.sessions.as_ref(),
            &self.events,
            self.config.pacing,
            self.cancel.clone(),
        );
        let outcome = executor.run(&mut session, credentials).await;
        self.session = Some(session);

        match outcome {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.results.finalize();
                }
                self.apply(Trigger::Finished, OP).await?;
                self.record_outcome(HistoryStatus::Completed).await;
            }
            Err(ImportError::Cancelled) => {
                warn!("Import cancelled; in-flight results discarded");
                self.reset_import().await?;
                return Err(ImportError::Cancelled);
            }
            Err(ImportError::Authentication(e)) => {
                error!(error = %e, "Authentication failed; nothing was sent");
                self.fail(Trigger::AuthenticationFailed, OP, e.to_string()).await?;
                self.record_outcome(HistoryStatus::Error).await;
                return Err(ImportError::Authentication(e));
            }
            Err(other) => return Err(other),
        }

        self.session
            .as_ref()
            .map(|s| &s.results)
            .ok_or(ImportError::NothingToImport)
    }

    /// Abandon everything and return to Idle
    ///
    /// Valid in every state. A running batch is cancelled.
    pub async fn reset_import(&mut self) -> Result<(), ImportError> {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();

        self.apply(Trigger::Reset, "reset_import").await?;
        self.session = None;
        self.last_error = None;
        self.sessions.clear().await?;
        Ok(())
    }

    /// Restore the persisted session, if any
    ///
    /// A session older than the freshness window is discarded. A session
    /// saved mid-batch comes back as Preview with its partial results kept,
    /// or is completed and written to history when no record is pending.
    /// One saved while parsing or validating comes back as FileSelected so
    /// the file is read again.
    pub async fn restore(&mut self) -> Result<Option<RestoreOutcome>, ImportError> {
        let saved = match self.sessions.load().await {
            Ok(Some(saved)) => saved,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Persisted session unreadable; discarding");
                self.sessions.clear().await?;
                return Ok(None);
            }
        };

        let saved_at = saved.timestamp;
        if saved.is_stale(Utc::now(), self.config.session_ttl) {
            info!(session_id = %saved.id, saved_at = %saved_at, "Discarding stale session");
            self.sessions.clear().await?;
            self.events.emit_lossy(ImportEvent::SessionDiscarded {
                session_id: saved.id,
                saved_at,
            });
            return Ok(Some(RestoreOutcome::Discarded { saved_at }));
        }

        let mut session = saved;
        if session.state == ImportState::Processing && session.pending_records().is_empty() {
            return self.finish_restored_batch(session, saved_at).await.map(Some);
        }

        let state = match session.state {
            ImportState::Processing | ImportState::Preview => ImportState::Preview,
            ImportState::Parsing | ImportState::Validating => {
                session.parsed_rows.clear();
                session.validated_records.clear();
                session.validation_errors.clear();
                session.results = ImportResult::default();
                ImportState::FileSelected
            }
            other => other,
        };
        session.state = state;
        let pending = session.pending_records().len();

        info!(
            session_id = %session.id,
            state = %state,
            pending,
            "Restored import session"
        );
        self.events.emit_lossy(ImportEvent::SessionRestored {
            session_id: session.id,
            state: state.to_string(),
            saved_at,
        });

        self.state = state;
        self.last_error = None;
        self.session = Some(session);

        Ok(Some(RestoreOutcome::Restored {
            state,
            saved_at,
            pending,
        }))
    }

    /// A batch saved after its last record but before completion is closed
    /// out here, since nothing is left to send
    async fn finish_restored_batch(
        &mut self,
        mut session: ImportSession,
        saved_at: DateTime<Utc>,
    ) -> Result<RestoreOutcome, ImportError> {
        let total = session.validated_records.len();
        session.update_progress(total, total);
        session.results.finalize();
        info!(
            session_id = %session.id,
            successes = session.results.success_count(),
            failures = session.results.error_count(),
            "Restored batch had no pending records; completing it"
        );
        self.events.emit_lossy(ImportEvent::SessionRestored {
            session_id: session.id,
            state: ImportState::Processing.to_string(),
            saved_at,
        });

        self.state = ImportState::Processing;
        self.last_error = None;
        self.session = Some(session);
        self.apply(Trigger::Finished, "restore").await?;
        self.record_outcome(HistoryStatus::Completed).await;

        Ok(RestoreOutcome::Restored {
            state: self.state,
            saved_at,
            pending: 0,
        })
    }
}

/// File stem plus the selection time
pub fn default_import_name(file: &SelectedFile) -> String {
    let stem = Path::new(&file.name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.name.clone());
    format!("{} {}", stem, Utc::now().format("%Y-%m-%d %H:%M"))
}
