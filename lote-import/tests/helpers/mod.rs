//! Test Helper Utilities
//!
//! Shared utilities for testing lote-import

#![allow(dead_code)]

pub mod mock_tracker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lote_common::events::{EventBus, ImportEvent};
use lote_import::db::{init_database_pool, HistoryStore, MemoryStore, SessionStore, SqliteStore};
use lote_import::{Credentials, ImportConfig, ImportWorkflow};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub use mock_tracker::{Call, ScriptedTracker};

/// Write an input file into `dir`
pub fn write_input(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// `n` valid Tarefa rows titled A, B, C, ...
pub fn tarefa_rows(n: usize) -> String {
    let mut content = String::from("tipo,titulo\n");
    for i in 0..n {
        content.push_str(&format!("Tarefa,{}\n", (b'A' + i as u8) as char));
    }
    content
}

pub fn credentials() -> Credentials {
    Credentials::new("ana", "segredo")
}

/// Default settings without the pacing delay
pub fn test_config() -> ImportConfig {
    ImportConfig::default().without_pacing()
}

/// A workflow over in-memory stores and a scripted tracker
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryStore>,
    pub tracker: Arc<ScriptedTracker>,
    pub events: EventBus,
    pub workflow: ImportWorkflow,
}

impl Harness {
    pub async fn new(tracker: ScriptedTracker) -> Self {
        Self::with_config(test_config(), tracker).await
    }

    pub async fn with_config(config: ImportConfig, tracker: ScriptedTracker) -> Self {
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(tracker);
        let events = EventBus::new(256);
        let workflow = ImportWorkflow::new(
            config,
            store.clone() as Arc<dyn SessionStore>,
            store.clone() as Arc<dyn HistoryStore>,
            tracker.clone(),
            events.clone(),
        )
        .await
        .unwrap();

        Self {
            dir: TempDir::new().unwrap(),
            store,
            tracker,
            events,
            workflow,
        }
    }

    pub fn input(&self, name: &str, content: &str) -> PathBuf {
        write_input(self.dir.path(), name, content)
    }
}

/// Create a file-backed test database
///
/// Returns the TempDir to keep the database alive for the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database_pool(&dir.path().join("lote.db")).await.unwrap();
    (dir, pool)
}

/// A workflow over a SQLite store, as the binary wires it
pub async fn sqlite_workflow(
    pool: &SqlitePool,
    tracker: Arc<ScriptedTracker>,
    events: EventBus,
) -> ImportWorkflow {
    let store = Arc::new(SqliteStore::new(pool.clone()));
    ImportWorkflow::new(
        test_config(),
        store.clone() as Arc<dyn SessionStore>,
        store as Arc<dyn HistoryStore>,
        tracker,
        events,
    )
    .await
    .unwrap()
}

/// Drain every event currently queued on a receiver
pub fn drain(rx: &mut broadcast::Receiver<ImportEvent>) -> Vec<ImportEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
