//! Broadcast bus for orchestrator status changes.
//!
//! Built on `tokio::sync::broadcast`; the page shell (save indicator,
//! navigation, frame loader) subscribes. Publishing with no subscribers is a
//! no-op.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use dossier_types::section::SectionKey;

/// Default channel capacity.
pub const STATUS_BUFFER: usize = 256;

/// Something the user-facing shell should reflect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A section became active; the section frame should load `path`.
    SectionActivated { section: SectionKey, path: String },
    /// Explicit save persisted.
    Saved { section: SectionKey },
    /// Autosave persisted.
    AutoSaved { section: SectionKey },
    /// The medium rejected a write. The in-memory draft is kept.
    SaveFailed { reason: String },
    /// An explicit save got no answer in time.
    SaveStuck { section: SectionKey },
    SectionVisibility { section: SectionKey, show: bool },
    DraftCleared,
}

/// Multi-consumer status bus. Cloning shares the sender.
#[derive(Clone)]
pub struct StatusBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(STATUS_BUFFER)
    }
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// Publish to all current subscribers; dropped if there are none.
    pub fn publish(&self, event: StatusEvent) {
        let _ = self.sender.send(event);
    }
}

impl std::fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
