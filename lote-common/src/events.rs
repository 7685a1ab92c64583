//! Event types for the lote event system
//!
//! Import progress is published through an [`EventBus`] so any front end
//! (CLI progress line, log sink, test probe) can observe a running import
//! without the import code knowing who is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Import lifecycle events
///
/// Events are broadcast via [`EventBus`] and serialize with a `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ImportEvent {
    /// The workflow moved between two states
    StateChanged {
        session_id: Option<Uuid>,
        old_state: String,
        new_state: String,
        timestamp: DateTime<Utc>,
    },

    /// One more record has an outcome
    Progress {
        session_id: Uuid,
        completed: usize,
        total: usize,
        /// `completed / total`, 0.0 - 1.0
        fraction: f64,
        timestamp: DateTime<Utc>,
    },

    /// The remote service accepted a record
    RecordCreated {
        session_id: Uuid,
        line: usize,
        remote_id: String,
    },

    /// The remote service rejected a record; the batch continues
    RecordFailed {
        session_id: Uuid,
        line: usize,
        message: String,
    },

    /// A persisted session was restored on startup
    SessionRestored {
        session_id: Uuid,
        state: String,
        saved_at: DateTime<Utc>,
    },

    /// A persisted session was older than the freshness window and dropped
    SessionDiscarded {
        session_id: Uuid,
        saved_at: DateTime<Utc>,
    },
}

impl ImportEvent {
    /// Event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            ImportEvent::StateChanged { .. } => "StateChanged",
            ImportEvent::Progress { .. } => "Progress",
            ImportEvent::RecordCreated { .. } => "RecordCreated",
            ImportEvent::RecordFailed { .. } => "RecordFailed",
            ImportEvent::SessionRestored { .. } => "SessionRestored",
            ImportEvent::SessionDiscarded { .. } => "SessionDiscarded",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ImportEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ImportEvent,
    ) -> Result<usize, broadcast::error::SendError<ImportEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the absence of subscribers
    pub fn emit_lossy(&self, event: ImportEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
