//! Typed helpers over [`RequestOrchestrator::execute`].
//!
//! Each helper uses the operation's default options (see
//! [`RequestOrchestrator::options_for`]) and decodes the response body.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::RequestOrchestrator;
use crate::backup::{Backup, BackupSummary, RestoreResult};
use crate::error::SyncError;
use crate::settings::Settings;
use crate::transport::routes::ops;

fn decode<T: DeserializeOwned>(operation: &str, value: Value) -> Result<T, SyncError> {
    serde_json::from_value(value).map_err(|e| SyncError::Network {
        status: None,
        message: format!("malformed {operation} response: {e}"),
    })
}

impl RequestOrchestrator {
    async fn call(&self, operation: &str, payload: Value) -> Result<Value, SyncError> {
        let options = self.options_for(operation);
        self.execute(operation, payload, &options).await
    }

    pub async fn get_settings(&self) -> Result<Settings, SyncError> {
        let value = self.call(ops::GET_SETTINGS, Value::Null).await?;
        Settings::from_value(value)
    }

    /// Save a full settings document or a partial patch.
    pub async fn save_settings(&self, settings: &Settings) -> Result<Value, SyncError> {
        self.call(ops::SAVE_SETTINGS, settings.to_value()).await
    }

    pub async fn reset_settings(&self) -> Result<Value, SyncError> {
        self.call(ops::RESET_SETTINGS, Value::Null).await
    }

    pub async fn list_themes(&self) -> Result<Value, SyncError> {
        self.call(ops::LIST_THEMES, Value::Null).await
    }

    pub async fn apply_theme(&self, theme_id: &str) -> Result<Value, SyncError> {
        self.call(ops::APPLY_THEME, json!({ "id": theme_id })).await
    }

    pub async fn create_backup(&self, note: Option<&str>) -> Result<Backup, SyncError> {
        let value = self.call(ops::CREATE_BACKUP, json!({ "note": note })).await?;
        decode(ops::CREATE_BACKUP, value)
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupSummary>, SyncError> {
        let value = self.call(ops::LIST_BACKUPS, Value::Null).await?;
        decode(ops::LIST_BACKUPS, value)
    }

    pub async fn get_backup(&self, backup_id: &str) -> Result<Backup, SyncError> {
        let value = self.call(ops::GET_BACKUP, json!({ "id": backup_id })).await?;
        decode(ops::GET_BACKUP, value)
    }

    pub async fn restore_backup(&self, backup_id: &str) -> Result<RestoreResult, SyncError> {
        let value = self.call(ops::RESTORE_BACKUP, json!({ "id": backup_id })).await?;
        decode(ops::RESTORE_BACKUP, value)
    }

    pub async fn delete_backup(&self, backup_id: &str) -> Result<(), SyncError> {
        self.call(ops::DELETE_BACKUP, json!({ "id": backup_id })).await?;
        Ok(())
    }

    /// Returns the number of automatic backups pruned.
    pub async fn cleanup_backups(&self) -> Result<usize, SyncError> {
        let value = self.call(ops::CLEANUP_BACKUPS, Value::Null).await?;
        let deleted = value.get("deleted").cloned().unwrap_or(value);
        decode(ops::CLEANUP_BACKUPS, deleted)
    }
}
