//! Point-in-time settings backups with all-or-nothing restore.
//!
//! - [`manager`]: create/list/restore/delete/prune and backup-before-import
//! - [`types`]: backup records and the restore state machine
//! - [`validate`]: structural checks run before any restore
//! - [`retention`]: which automatic backups to prune

pub mod manager;
pub mod retention;
pub mod types;
pub mod validate;

pub use manager::BackupManager;
pub use retention::backups_to_prune;
pub use types::{Backup, BackupMetadata, BackupSummary, BackupType, RestorePhase, RestoreResult};
pub use validate::backup_problems;
