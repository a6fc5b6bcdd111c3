// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backup records and the restore state machine.
//!
//! # Restore phases
//!
//! ```text
//! Validating ──→ Rejected
//!     │
//!     ▼
//! SnapshottingCurrent ──→ WritingTarget ──→ Committed
//!                               │
//!                               ▼
//!                          RollingBack ──→ RolledBack
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who created a backup. Only automatic backups are subject to retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Manual,
    Automatic,
}

impl BackupType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }
}

impl std::fmt::Display for BackupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
    pub tool_version: String,
    pub environment_version: String,
    /// Why an automatic backup was taken (`pre-restore`, `pre-import`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A point-in-time settings snapshot. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    /// Raw snapshot; validated structurally before any restore
    pub settings: Value,
    pub metadata: BackupMetadata,
}

impl Backup {
    #[must_use]
    pub fn summary(&self) -> BackupSummary {
        BackupSummary {
            id: self.id.clone(),
            timestamp: self.timestamp,
            backup_type: self.backup_type,
            note: self.metadata.note.clone(),
            reason: self.metadata.reason.clone(),
            setting_count: self.settings.as_object().map_or(0, |m| m.len()),
        }
    }
}

/// Index entry listed without loading the snapshot body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub id: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub setting_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePhase {
    Validating,
    Rejected,
    SnapshottingCurrent,
    WritingTarget,
    Committed,
    RollingBack,
    RolledBack,
}

impl RestorePhase {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_transition_to(self, next: RestorePhase) -> bool {
        use RestorePhase::*;
        matches!(
            (self, next),
            (Validating, Rejected)
                | (Validating, SnapshottingCurrent)
                | (SnapshottingCurrent, WritingTarget)
                | (WritingTarget, Committed)
                | (WritingTarget, RollingBack)
                | (RollingBack, RolledBack)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Committed | Self::RolledBack)
    }
}

/// Outcome of a committed restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub backup_id: String,
    /// Automatic snapshot of the live settings taken just before the write
    pub pre_restore_backup_id: String,
    /// Phases traversed, in order
    pub phases: Vec<RestorePhase>,
    pub restored_keys: usize,
}
