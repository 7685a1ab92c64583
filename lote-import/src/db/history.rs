//! Capped import history
//!
//! Newest entry first. Adding beyond the limit evicts the oldest entry, and
//! every mutation writes the whole list back through the [`HistoryStore`].

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::store::HistoryStore;
use crate::error::ImportError;
use crate::models::HistoryEntry;
use crate::report::write_report;

/// Default number of entries kept
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

pub struct ImportHistory {
    store: Arc<dyn HistoryStore>,
    limit: usize,
    entries: Vec<HistoryEntry>,
}

impl ImportHistory {
    /// Load the persisted list, trimming it to `limit`
    pub async fn load(store: Arc<dyn HistoryStore>, limit: usize) -> Result<Self, ImportError> {
        let mut entries = store.load_history().await?;
        let limit = limit.max(1);
        entries.truncate(limit);
        debug!(entries = entries.len(), limit, "History loaded");

        Ok(Self {
            store,
            limit,
            entries,
        })
    }

    /// Newest first
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn find(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Prepend an entry, evicting the oldest beyond the limit
    pub async fn record(&mut self, entry: HistoryEntry) -> Result<(), ImportError> {
        info!(
            id = %entry.id,
            status = entry.status.as_str(),
            successes = entry.success_count,
            errors = entry.error_count,
            "Recording import in history"
        );
        self.entries.insert(0, entry);
        if self.entries.len() > self.limit {
            let evicted = self.entries.split_off(self.limit);
            debug!(evicted = evicted.len(), "History limit reached; oldest evicted");
        }
        self.store.save_history(&self.entries).await?;
        Ok(())
    }

    /// Drop every entry and the persisted list
    pub async fn clear(&mut self) -> Result<(), ImportError> {
        self.entries.clear();
        self.store.clear_history().await?;
        info!("History cleared");
        Ok(())
    }

    /// Regenerate the result report of a past import
    ///
    /// Works purely from the stored entry; the remote service is not
    /// contacted.
    pub fn redownload(&self, id: Uuid) -> Result<String, ImportError> {
        let entry = self.find(id).ok_or_else(|| {
            ImportError::Storage(lote_common::Error::NotFound(format!(
                "Histórico {} não encontrado",
                id
            )))
        })?;
        write_report(&entry.results)
    }
}
