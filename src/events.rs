// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Notification channel consumed by UI collaborators.
//!
//! Every notification serializes as `{type, timestamp, ...fields}`:
//!
//! ```
//! use settings_sync::events::{Event, Notification};
//!
//! let n = Notification { timestamp: 42, event: Event::PreviewCleared };
//! let json = serde_json::to_value(&n).unwrap();
//! assert_eq!(json["type"], "preview-cleared");
//! assert_eq!(json["timestamp"], 42);
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::backup::BackupType;
use crate::clock::{Clock, SystemClock};
use crate::error::ErrorKind;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    PreviewUpdated {
        generation: u64,
        css_length: usize,
        elapsed_ms: u64,
        /// True when the stylesheet came from the color-only fallback
        fallback: bool,
    },
    PreviewError {
        generation: u64,
        kind: ErrorKind,
        message: String,
    },
    PreviewCleared,
    BackupCreated {
        backup_id: String,
        backup_type: BackupType,
    },
    BackupDeleted {
        backup_id: String,
    },
    BackupRestored {
        backup_id: String,
        pre_restore_backup_id: String,
    },
    RestoreRolledBack {
        backup_id: String,
        pre_restore_backup_id: String,
        error: String,
        /// False when the rollback write itself failed
        rolled_back: bool,
    },
    BackupsPruned {
        deleted: usize,
    },
}

impl Event {
    /// Wire name of the event (`preview-updated`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreviewUpdated { .. } => "preview-updated",
            Self::PreviewError { .. } => "preview-error",
            Self::PreviewCleared => "preview-cleared",
            Self::BackupCreated { .. } => "backup-created",
            Self::BackupDeleted { .. } => "backup-deleted",
            Self::BackupRestored { .. } => "backup-restored",
            Self::RestoreRolledBack { .. } => "restore-rolled-back",
            Self::BackupsPruned { .. } => "backups-pruned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// Broadcast bus for [`Notification`]s. Cheap to clone.
///
/// Emitting with no subscribers is not an error; slow subscribers lag and
/// lose the oldest notifications rather than blocking emitters.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
    clock: Arc<dyn Clock>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl EventBus {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx, clock }
    }

    pub fn emit(&self, event: Event) {
        let name = event.name();
        let notification = Notification { timestamp: self.clock.now_ms(), event };
        let receivers = self.tx.send(notification).unwrap_or(0);
        trace!(event = name, receivers, "Notification emitted");
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}
