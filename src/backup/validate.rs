//! Structural validation of backup records.

use super::types::{Backup, BackupMetadata, BackupType};
use crate::settings::structural_problems;

/// Every structural problem with `backup`. Empty means restorable.
#[must_use]
pub fn backup_problems(backup: &Backup) -> Vec<String> {
    let mut problems = Vec::new();
    if backup.id.trim().is_empty() {
        problems.push("backup id is empty".to_string());
    }
    if backup.timestamp == 0 {
        problems.push("backup timestamp is missing".to_string());
    }
    problems.extend(metadata_problems(&backup.metadata, backup.backup_type));
    problems.extend(structural_problems(&backup.settings));
    problems
}

fn metadata_problems(metadata: &BackupMetadata, backup_type: BackupType) -> Vec<String> {
    let mut problems = Vec::new();
    if metadata.tool_version.trim().is_empty() {
        problems.push("metadata.tool_version is empty".to_string());
    }
    if metadata.environment_version.trim().is_empty() {
        problems.push("metadata.environment_version is empty".to_string());
    }
    if backup_type == BackupType::Automatic && metadata.reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
        problems.push("metadata.reason is missing for an automatic backup".to_string());
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn backup(settings: Value) -> Backup {
        Backup {
            id: "backup_1_ab".into(),
            timestamp: 1_000,
            backup_type: BackupType::Manual,
            settings,
            metadata: BackupMetadata {
                tool_version: "1.2.0".into(),
                environment_version: "6.4".into(),
                ..BackupMetadata::default()
            },
        }
    }

    #[test]
    fn test_well_formed_backup_passes() {
        assert!(backup_problems(&backup(json!({"menu_background": "#000"}))).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut b = backup(json!({"a": [1], "b": {"c": 1}}));
        b.id = String::new();
        let problems = backup_problems(&b);
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn test_blank_metadata_is_rejected() {
        let mut b = backup(json!({"a": 9}));
        b.metadata = BackupMetadata::default();
        assert_eq!(
            backup_problems(&b),
            vec!["metadata.tool_version is empty".to_string(), "metadata.environment_version is empty".to_string()]
        );
    }

    #[test]
    fn test_automatic_backup_needs_reason() {
        let mut b = backup(json!({"a": 9}));
        b.backup_type = BackupType::Automatic;
        assert_eq!(backup_problems(&b), vec!["metadata.reason is missing for an automatic backup".to_string()]);

        b.metadata.reason = Some("pre-restore".into());
        assert!(backup_problems(&b).is_empty());
    }

    #[test]
    fn test_missing_settings() {
        assert_eq!(backup_problems(&backup(Value::Null)), vec!["settings are missing".to_string()]);
    }
}
