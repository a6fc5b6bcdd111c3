use async_trait::async_trait;
use thiserror::Error;

use crate::backup::{Backup, BackupSummary};
use crate::error::SyncError;
use crate::settings::Settings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Data corruption detected for '{id}': expected hash {expected}, got {actual}")]
    Corruption {
        id: String,
        expected: String,
        actual: String,
    },
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(resource) => SyncError::NotFound { resource },
            other => SyncError::Storage(other.to_string()),
        }
    }
}

/// Authoritative copy of the live settings. Each write replaces the
/// whole record atomically.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn read(&self) -> Result<Settings, StorageError>;
    async fn write(&self, settings: &Settings) -> Result<(), StorageError>;
}

/// Backup snapshots plus a lightweight index for listing.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, backup: &Backup) -> Result<(), StorageError>;
    async fn load(&self, id: &str) -> Result<Option<Backup>, StorageError>;
    /// Returns `false` if nothing was stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
    /// Index entries in no particular order.
    async fn list_summaries(&self) -> Result<Vec<BackupSummary>, StorageError>;
}
