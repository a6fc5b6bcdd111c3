//! Retention policy for automatic backups.
//!
//! Automatic backups beyond `max_automatic` are pruned oldest-first.
//! Manual backups are never pruned, whatever their age or count.

use super::types::{BackupSummary, BackupType};

/// Ids of the automatic backups to delete, oldest first.
///
/// Ties on timestamp are broken by id so the result is deterministic.
#[must_use]
pub fn backups_to_prune(summaries: &[BackupSummary], max_automatic: usize) -> Vec<String> {
    let mut automatic: Vec<&BackupSummary> =
        summaries.iter().filter(|s| s.backup_type == BackupType::Automatic).collect();
    if automatic.len() <= max_automatic {
        return Vec::new();
    }

    automatic.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    let excess = automatic.len() - max_automatic;
    automatic.into_iter().take(excess).map(|s| s.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, ts: u64, backup_type: BackupType) -> BackupSummary {
        BackupSummary {
            id: id.to_string(),
            timestamp: ts,
            backup_type,
            note: None,
            reason: None,
            setting_count: 0,
        }
    }

    #[test]
    fn test_prunes_oldest_automatic() {
        let mut all: Vec<BackupSummary> =
            (0..15).map(|i| summary(&format!("auto_{i:02}"), 1_000 + i, BackupType::Automatic)).collect();
        all.push(summary("manual_old", 1, BackupType::Manual));

        let pruned = backups_to_prune(&all, 10);
        assert_eq!(pruned, vec!["auto_00", "auto_01", "auto_02", "auto_03", "auto_04"]);
    }

    #[test]
    fn test_manual_never_pruned() {
        let all: Vec<BackupSummary> =
            (0..20).map(|i| summary(&format!("m{i}"), i, BackupType::Manual)).collect();
        assert!(backups_to_prune(&all, 0).is_empty());
    }

    #[test]
    fn test_under_limit_prunes_nothing() {
        let all = vec![summary("a", 1, BackupType::Automatic), summary("b", 2, BackupType::Automatic)];
        assert!(backups_to_prune(&all, 2).is_empty());
    }

    #[test]
    fn test_unsorted_input() {
        let all = vec![
            summary("new", 30, BackupType::Automatic),
            summary("old", 10, BackupType::Automatic),
            summary("mid", 20, BackupType::Automatic),
        ];
        assert_eq!(backups_to_prune(&all, 1), vec!["old", "mid"]);
    }
}
