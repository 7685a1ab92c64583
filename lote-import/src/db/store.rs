//! Persistence ports for the session slot and the history list
//!
//! The workflow only talks to [`SessionStore`] and [`HistoryStore`].
//! [`SqliteStore`] is the production backend; [`MemoryStore`] keeps the
//! same JSON payloads in memory for tests and dry runs.

use async_trait::async_trait;
use chrono::Utc;
use lote_common::Result;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use super::{HISTORY_SLOT, SESSION_SLOT};
use crate::models::{HistoryEntry, ImportSession};

/// Single "current session" slot
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &ImportSession) -> Result<()>;
    async fn load(&self) -> Result<Option<ImportSession>>;
    async fn clear(&self) -> Result<()>;
}

/// Whole-list history persistence
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load_history(&self) -> Result<Vec<HistoryEntry>>;
    async fn save_history(&self, entries: &[HistoryEntry]) -> Result<()>;
    async fn clear_history(&self) -> Result<()>;
}

// ============================================================================
// SQLite
// ============================================================================

/// SQLite-backed store over the `import_store` table
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn put(&self, slot: &str, payload: String) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();

        retry_on_lock("put_slot", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            sqlx::query(
                r#"
                INSERT INTO import_store (slot, payload, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(slot) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(slot)
            .bind(&payload)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
            .map_err(lote_common::Error::Database)?;
            Ok::<(), lote_common::Error>(())
        })
        .await
    }

    async fn get(&self, slot: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT payload FROM import_store WHERE slot = ?")
            .bind(slot)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<String, _>("payload")))
    }

    async fn delete(&self, slot: &str) -> Result<()> {
        retry_on_lock("delete_slot", DEFAULT_MAX_LOCK_WAIT_MS, || async {
            sqlx::query("DELETE FROM import_store WHERE slot = ?")
                .bind(slot)
                .execute(&self.pool)
                .await
                .map_err(lote_common::Error::Database)?;
            Ok::<(), lote_common::Error>(())
        })
        .await
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn save(&self, session: &ImportSession) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        self.put(SESSION_SLOT, payload).await
    }

    async fn load(&self) -> Result<Option<ImportSession>> {
        match self.get(SESSION_SLOT).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<()> {
        self.delete(SESSION_SLOT).await
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        match self.get(HISTORY_SLOT).await? {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_history(&self, entries: &[HistoryEntry]) -> Result<()> {
        let payload = serde_json::to_string(entries)?;
        self.put(HISTORY_SLOT, payload).await
    }

    async fn clear_history(&self) -> Result<()> {
        self.delete(HISTORY_SLOT).await
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory store holding the serialized payloads
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: Mutex<Option<String>>,
    history: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the history slot currently holds anything
    pub async fn has_history(&self) -> bool {
        self.history.lock().await.is_some()
    }

    /// Whether the session slot currently holds anything
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, session: &ImportSession) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        *self.session.lock().await = Some(payload);
        Ok(())
    }

    async fn load(&self) -> Result<Option<ImportSession>> {
        match self.session.lock().await.as_deref() {
            Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        match self.history.lock().await.as_deref() {
            Some(payload) => Ok(serde_json::from_str(payload)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_history(&self, entries: &[HistoryEntry]) -> Result<()> {
        let payload = serde_json::to_string(entries)?;
        *self.history.lock().await = Some(payload);
        Ok(())
    }

    async fn clear_history(&self) -> Result<()> {
        *self.history.lock().await = None;
        Ok(())
    }
}
