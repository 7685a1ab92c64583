//! Database access for lote-import
//!
//! A single key/value table holds the current session snapshot and the
//! import history, each serialized as JSON under its own slot.

pub mod history;
pub mod retry;
pub mod store;

use lote_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

pub use history::ImportHistory;
pub use store::{HistoryStore, MemoryStore, SessionStore, SqliteStore};

/// Slot holding the single in-flight session
pub const SESSION_SLOT: &str = "current_session";
/// Slot holding the capped history list
pub const HISTORY_SLOT: &str = "import_history";

/// Initialize database connection pool
///
/// Creates the database file and its parent folder when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the slot table if it does not exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_store (
            slot TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (import_store)");

    Ok(())
}
