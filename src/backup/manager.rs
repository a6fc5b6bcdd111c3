// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backup & restore manager.
//!
//! Restore is all-or-nothing. Before the target settings are written, the
//! live settings are captured in an automatic `pre-restore` backup; that
//! snapshot doubles as the rollback source if the write (or the
//! read-back verification after it) fails.
//!
//! ```text
//! restore_backup(id)
//!   Validating ──── problems ───→ Rejected (nothing mutated)
//!       │
//!   SnapshottingCurrent  (automatic pre-restore backup)
//!       │
//!   WritingTarget ── write + verify ok ──→ Committed
//!       │
//!       └─ failure ─→ RollingBack ─→ RolledBack
//!                     (live settings rewritten from the pre-restore backup,
//!                      original error surfaced)
//! ```

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::retention::backups_to_prune;
use super::types::{Backup, BackupMetadata, BackupSummary, BackupType, RestorePhase, RestoreResult};
use super::validate::backup_problems;
use crate::cache::canonical_json;
use crate::clock::{Clock, SystemClock};
use crate::config::SettingsSyncConfig;
use crate::error::SyncError;
use crate::events::{Event, EventBus};
use crate::settings::Settings;
use crate::storage::{SettingsStore, SnapshotStore, StorageError};

const PRE_RESTORE: &str = "pre-restore";
const PRE_IMPORT: &str = "pre-import";
const SCHEDULED: &str = "scheduled";

pub struct BackupManager {
    settings: Arc<dyn SettingsStore>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    max_automatic: usize,
    /// Run retention after automatic backups and committed writes
    auto_prune: bool,
    tool_version: String,
    environment_version: String,
    creator_id: Option<String>,
    /// Serializes restores and imports: only one may write live settings
    write_lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(
        config: &SettingsSyncConfig,
        settings: Arc<dyn SettingsStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            settings,
            snapshots,
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
            max_automatic: config.max_automatic_backups,
            auto_prune: true,
            tool_version: config.tool_version.clone(),
            environment_version: config.environment_version.clone(),
            creator_id: None,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Recorded as `creator_id` on every backup this manager creates.
    #[must_use]
    pub fn with_creator(mut self, creator_id: impl Into<String>) -> Self {
        self.creator_id = Some(creator_id.into());
        self
    }

    /// With `false`, retention only runs through [`Self::cleanup_old_backups`].
    #[must_use]
    pub fn with_auto_prune(mut self, enabled: bool) -> Self {
        self.auto_prune = enabled;
        self
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Snapshot the live settings. Automatic backups taken this way are
    /// recorded with reason `scheduled`.
    #[tracing::instrument(skip(self, note))]
    pub async fn create_backup(&self, backup_type: BackupType, note: Option<String>) -> Result<Backup, SyncError> {
        let reason = (backup_type == BackupType::Automatic).then_some(SCHEDULED);
        let (backup, _) = self.snapshot_live(backup_type, note, reason).await?;
        if backup_type == BackupType::Automatic {
            self.prune_quietly().await;
        }
        Ok(backup)
    }

    /// All backups, newest first. Snapshot bodies are not loaded.
    pub async fn list_backups(&self) -> Result<Vec<BackupSummary>, SyncError> {
        let mut summaries = self.snapshots.list_summaries().await?;
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(summaries)
    }

    pub async fn get_backup(&self, id: &str) -> Result<Backup, SyncError> {
        self.snapshots
            .load(id)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("backups/{id}")))
    }

    /// Restore a backup over the live settings.
    ///
    /// Structural or metadata problems reject the restore before anything
    /// is written.
    /// A failed write is rolled back from the pre-restore snapshot and the
    /// original error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn restore_backup(&self, backup_id: &str) -> Result<RestoreResult, SyncError> {
        let _write = self.write_lock.lock().await;
        let mut phases = vec![RestorePhase::Validating];

        let backup = self.get_backup(backup_id).await?;
        let problems = backup_problems(&backup);
        if !problems.is_empty() {
            advance(&mut phases, RestorePhase::Rejected);
            warn!(backup_id, problems = problems.len(), "Restore rejected, backup is malformed");
            crate::metrics::record_restore("rejected");
            return Err(SyncError::validation(problems));
        }
        let target = Settings::from_value(backup.settings.clone())?;

        advance(&mut phases, RestorePhase::SnapshottingCurrent);
        let note = Some(format!("Before restoring {backup_id}"));
        let (pre, live) = self.snapshot_live(BackupType::Automatic, note, Some(PRE_RESTORE)).await?;

        advance(&mut phases, RestorePhase::WritingTarget);
        if let Err(err) = self.write_verified(&target).await {
            advance(&mut phases, RestorePhase::RollingBack);
            let rolled_back = self.roll_back(&live, backup_id, &pre.id, &err).await;
            if rolled_back {
                advance(&mut phases, RestorePhase::RolledBack);
            }
            debug!(backup_id, ?phases, "Restore aborted");
            return Err(err);
        }

        advance(&mut phases, RestorePhase::Committed);
        info!(backup_id, pre_restore_backup_id = %pre.id, keys = target.len(), "Restore committed");
        crate::metrics::record_restore("committed");
        self.events.emit(Event::BackupRestored {
            backup_id: backup_id.to_string(),
            pre_restore_backup_id: pre.id.clone(),
        });
        self.prune_quietly().await;

        Ok(RestoreResult {
            backup_id: backup_id.to_string(),
            pre_restore_backup_id: pre.id,
            phases,
            restored_keys: target.len(),
        })
    }

    pub async fn delete_backup(&self, backup_id: &str) -> Result<(), SyncError> {
        if !self.snapshots.delete(backup_id).await? {
            return Err(SyncError::not_found(format!("backups/{backup_id}")));
        }
        info!(backup_id, "Backup deleted");
        self.events.emit(Event::BackupDeleted { backup_id: backup_id.to_string() });
        Ok(())
    }

    /// Delete automatic backups beyond the retention limit, oldest first.
    /// Manual backups are never touched. Returns the number deleted.
    pub async fn cleanup_old_backups(&self) -> Result<usize, SyncError> {
        let summaries = self.snapshots.list_summaries().await?;
        let doomed = backups_to_prune(&summaries, self.max_automatic);

        let mut deleted = 0;
        for id in &doomed {
            if self.snapshots.delete(id).await? {
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!(deleted, max_automatic = self.max_automatic, "Old automatic backups pruned");
            crate::metrics::record_backups_pruned(deleted);
            self.events.emit(Event::BackupsPruned { deleted });
        }
        Ok(deleted)
    }

    /// Replace the live settings with imported ones, taking an automatic
    /// `pre-import` backup first. Returns that backup's id.
    #[tracing::instrument(skip(self, imported, note))]
    pub async fn import_settings(&self, imported: Value, note: Option<String>) -> Result<String, SyncError> {
        let target = Settings::from_value(imported)?;
        let _write = self.write_lock.lock().await;

        let (pre, live) = self.snapshot_live(BackupType::Automatic, note, Some(PRE_IMPORT)).await?;
        if let Err(err) = self.write_verified(&target).await {
            self.roll_back(&live, PRE_IMPORT, &pre.id, &err).await;
            return Err(err);
        }
        info!(pre_import_backup_id = %pre.id, keys = target.len(), "Settings imported");
        self.prune_quietly().await;
        Ok(pre.id)
    }

    async fn snapshot_live(
        &self,
        backup_type: BackupType,
        note: Option<String>,
        reason: Option<&str>,
    ) -> Result<(Backup, Settings), SyncError> {
        let live = self.settings.read().await?;
        let timestamp = self.clock.now_ms().max(1);
        let backup = Backup {
            id: new_backup_id(timestamp),
            timestamp,
            backup_type,
            settings: live.to_value(),
            metadata: BackupMetadata {
                note,
                creator_id: self.creator_id.clone(),
                tool_version: self.tool_version.clone(),
                environment_version: self.environment_version.clone(),
                reason: reason.map(String::from),
            },
        };
        self.snapshots.save(&backup).await?;

        info!(backup_id = %backup.id, backup_type = %backup_type, reason, "Backup created");
        crate::metrics::record_backup_created(backup_type.as_str());
        self.events.emit(Event::BackupCreated { backup_id: backup.id.clone(), backup_type });
        Ok((backup, live))
    }

    /// Write and read back; a mismatch is reported as corruption.
    async fn write_verified(&self, target: &Settings) -> Result<(), SyncError> {
        self.settings.write(target).await?;
        let stored = self.settings.read().await?;
        if &stored != target {
            return Err(StorageError::Corruption {
                id: "settings".into(),
                expected: digest(target),
                actual: digest(&stored),
            }
            .into());
        }
        Ok(())
    }

    /// Rewrite `live` after a failed write. Returns whether it succeeded.
    async fn roll_back(&self, live: &Settings, backup_id: &str, pre_id: &str, cause: &SyncError) -> bool {
        warn!(backup_id, pre_restore_backup_id = pre_id, error = %cause, "Write failed, rolling back");
        let rolled_back = match self.write_verified(live).await {
            Ok(()) => {
                crate::metrics::record_restore("rolled_back");
                true
            }
            Err(rollback_err) => {
                error!(
                    backup_id,
                    pre_restore_backup_id = pre_id,
                    error = %rollback_err,
                    "Rollback failed, live settings may be inconsistent"
                );
                crate::metrics::record_restore("rollback_failed");
                false
            }
        };
        self.events.emit(Event::RestoreRolledBack {
            backup_id: backup_id.to_string(),
            pre_restore_backup_id: pre_id.to_string(),
            error: cause.to_string(),
            rolled_back,
        });
        rolled_back
    }

    async fn prune_quietly(&self) {
        if !self.auto_prune {
            return;
        }
        if let Err(e) = self.cleanup_old_backups().await {
            warn!(error = %e, "Backup retention pass failed");
        }
    }
}

fn advance(phases: &mut Vec<RestorePhase>, next: RestorePhase) {
    debug_assert!(phases.last().is_some_and(|p| p.can_transition_to(next)), "illegal restore transition");
    phases.push(next);
}

fn new_backup_id(timestamp: u64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("backup_{timestamp}_{}", &suffix[..8])
}

fn digest(settings: &Settings) -> String {
    let hash = Sha256::digest(canonical_json(&settings.to_value()).as_bytes());
    hex::encode(&hash[..8])
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("max_automatic", &self.max_automatic)
            .field("auto_prune", &self.auto_prune)
            .field("tool_version", &self.tool_version)
            .finish()
    }
}
