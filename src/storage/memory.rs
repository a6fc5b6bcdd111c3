use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use super::traits::{SettingsStore, SnapshotStore, StorageError};
use crate::backup::{Backup, BackupSummary};
use crate::settings::Settings;

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    data: RwLock<Settings>,
}

impl InMemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self { data: RwLock::new(settings) }
    }

    /// Current contents without going through the async trait
    #[must_use]
    pub fn snapshot(&self) -> Settings {
        self.data.read().clone()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn read(&self) -> Result<Settings, StorageError> {
        Ok(self.data.read().clone())
    }

    async fn write(&self, settings: &Settings) -> Result<(), StorageError> {
        *self.data.write() = settings.clone();
        Ok(())
    }
}

/// Snapshot store keyed by backup id. The index is derived from the
/// stored records, so the two can never disagree.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    data: DashMap<String, Backup>,
}

impl InMemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, backup: &Backup) -> Result<(), StorageError> {
        self.data.insert(backup.id.clone(), backup.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Backup>, StorageError> {
        Ok(self.data.get(id).map(|r| r.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(id).is_some())
    }

    async fn list_summaries(&self) -> Result<Vec<BackupSummary>, StorageError> {
        Ok(self.data.iter().map(|r| r.value().summary()).collect())
    }
}
