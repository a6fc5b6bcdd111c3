// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-flight request registry.
//!
//! At most one [`PendingOperation`] exists per fingerprint. The first caller
//! becomes the **leader** and performs the transport work; later callers
//! with the same fingerprint become **followers** and await the leader's
//! shared result over a `watch` channel.
//!
//! ```text
//! join_or_lead(fp)
//!     │
//!     ├─ fp registered ──→ Follower ── wait() ──→ leader's result
//!     │
//!     └─ fp free ───────→ Leader ─┬─ complete(result) ─→ publish, unregister
//!                                 ├─ cancel_key/cancel_all ─→ Cancelled
//!                                 └─ dropped early ─→ Cancelled
//! ```
//!
//! The entry is removed in every case: success, failure, cancellation, or
//! the leader's future being dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::error::SyncError;

/// Result slot shared by the leader and its followers.
pub type SharedResult = Option<Result<Value, SyncError>>;

struct PendingOperation {
    id: u64,
    cache_key: String,
    tx: Arc<watch::Sender<SharedResult>>,
}

#[derive(Default)]
pub struct PendingMap {
    entries: Mutex<HashMap<String, PendingOperation>>,
    next_id: AtomicU64,
}

pub enum Slot<'a> {
    Leader(LeaderGuard<'a>),
    Follower(Follower),
}

impl PendingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register as leader for `fingerprint`, or join the existing operation.
    pub fn join_or_lead(&self, fingerprint: &str, cache_key: &str) -> Slot<'_> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(fingerprint) {
            return Slot::Follower(Follower { rx: existing.tx.subscribe() });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, cancel_rx) = watch::channel(None);
        let tx = Arc::new(tx);
        entries.insert(
            fingerprint.to_string(),
            PendingOperation { id, cache_key: cache_key.to_string(), tx: tx.clone() },
        );
        Slot::Leader(LeaderGuard {
            map: self,
            fingerprint: fingerprint.to_string(),
            id,
            tx,
            cancel_rx,
            done: false,
        })
    }

    /// Cancel every pending operation for `cache_key`, in any time bucket.
    pub fn cancel_key(&self, cache_key: &str) -> usize {
        self.cancel_where(|op| op.cache_key == cache_key)
    }

    pub fn cancel_all(&self) -> usize {
        self.cancel_where(|_| true)
    }

    fn cancel_where(&self, pred: impl Fn(&PendingOperation) -> bool) -> usize {
        let cancelled: Vec<PendingOperation> = {
            let mut entries = self.entries.lock();
            let fingerprints: Vec<String> =
                entries.iter().filter(|(_, op)| pred(op)).map(|(fp, _)| fp.clone()).collect();
            fingerprints.iter().filter_map(|fp| entries.remove(fp)).collect()
        };
        for op in &cancelled {
            debug!(id = op.id, cache_key = %op.cache_key, "Pending operation cancelled");
            op.tx.send_replace(Some(Err(SyncError::Cancelled)));
        }
        cancelled.len()
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.lock().contains_key(fingerprint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Awaits a leader's result.
pub struct Follower {
    rx: watch::Receiver<SharedResult>,
}

impl Follower {
    pub async fn wait(mut self) -> Result<Value, SyncError> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(slot) => {
                let shared: SharedResult = (*slot).clone();
                shared.unwrap_or(Err(SyncError::Cancelled))
            }
            Err(_) => Err(SyncError::Cancelled),
        }
    }
}

/// Ownership of one pending operation. Dropping it without calling
/// [`LeaderGuard::complete`] publishes `Cancelled`.
pub struct LeaderGuard<'a> {
    map: &'a PendingMap,
    fingerprint: String,
    id: u64,
    tx: Arc<watch::Sender<SharedResult>>,
    cancel_rx: watch::Receiver<SharedResult>,
    done: bool,
}

impl LeaderGuard<'_> {
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Resolves once this operation is cancelled from outside.
    pub async fn cancelled(&mut self) {
        if self.cancel_rx.wait_for(Option::is_some).await.is_err() {
            // Sender lives as long as the guard
            std::future::pending::<()>().await;
        }
    }

    fn is_current(&self, entries: &HashMap<String, PendingOperation>) -> bool {
        entries.get(&self.fingerprint).is_some_and(|op| op.id == self.id)
    }

    /// Publish `result` to followers and unregister.
    ///
    /// `on_commit` runs (under the registry lock) only if the operation was
    /// still registered, so a cancelled call never touches shared state.
    /// Returns whether the result was committed.
    pub fn complete(
        mut self,
        result: Result<Value, SyncError>,
        on_commit: impl FnOnce(&Result<Value, SyncError>),
    ) -> bool {
        self.done = true;
        let committed = {
            let mut entries = self.map.entries.lock();
            if self.is_current(&entries) {
                entries.remove(&self.fingerprint);
                on_commit(&result);
                true
            } else {
                false
            }
        };
        if committed {
            self.tx.send_replace(Some(result));
        }
        committed
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let removed = {
            let mut entries = self.map.entries.lock();
            if self.is_current(&entries) {
                entries.remove(&self.fingerprint);
                true
            } else {
                false
            }
        };
        if removed {
            debug!(fingerprint = %self.fingerprint, "Leader dropped before completing");
            self.tx.send_replace(Some(Err(SyncError::Cancelled)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leader(slot: Slot<'_>) -> LeaderGuard<'_> {
        match slot {
            Slot::Leader(g) => g,
            Slot::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower(slot: Slot<'_>) -> Follower {
        match slot {
            Slot::Follower(f) => f,
            Slot::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn test_follower_receives_leader_result() {
        let map = PendingMap::new();
        let guard = leader(map.join_or_lead("fp", "k"));
        let f1 = follower(map.join_or_lead("fp", "k"));
        let f2 = follower(map.join_or_lead("fp", "k"));
        assert_eq!(map.len(), 1);

        assert!(guard.complete(Ok(json!(7)), |_| {}));
        assert!(map.is_empty());
        assert_eq!(f1.wait().await.unwrap(), json!(7));
        assert_eq!(f2.wait().await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let map = PendingMap::new();
        let guard = leader(map.join_or_lead("fp", "k"));
        let f = follower(map.join_or_lead("fp", "k"));
        guard.complete(Err(SyncError::not_found("backups/x")), |_| {});
        assert_eq!(f.wait().await.unwrap_err(), SyncError::not_found("backups/x"));
    }

    #[tokio::test]
    async fn test_cancel_key_notifies_and_skips_commit() {
        let map = PendingMap::new();
        let mut guard = leader(map.join_or_lead("fp-bucket-1", "k"));
        let f = follower(map.join_or_lead("fp-bucket-1", "k"));
        let _other = leader(map.join_or_lead("fp-other", "k2"));

        assert_eq!(map.cancel_key("k"), 1);
        assert!(!map.contains("fp-bucket-1"));
        assert!(map.contains("fp-other"));

        guard.cancelled().await;
        assert_eq!(f.wait().await.unwrap_err(), SyncError::Cancelled);

        let mut committed = false;
        assert!(!guard.complete(Ok(json!(1)), |_| committed = true));
        assert!(!committed);
    }

    #[tokio::test]
    async fn test_dropped_leader_cancels_followers() {
        let map = PendingMap::new();
        let guard = leader(map.join_or_lead("fp", "k"));
        let f = follower(map.join_or_lead("fp", "k"));
        drop(guard);
        assert!(map.is_empty());
        assert_eq!(f.wait().await.unwrap_err(), SyncError::Cancelled);
    }

    #[tokio::test]
    async fn test_new_leader_after_cancel_is_independent() {
        let map = PendingMap::new();
        let old = leader(map.join_or_lead("fp", "k"));
        map.cancel_all();
        let new = leader(map.join_or_lead("fp", "k"));

        // The stale leader neither commits nor unregisters the new one
        assert!(!old.complete(Ok(json!("stale")), |_| {}));
        assert!(map.contains("fp"));
        assert!(new.complete(Ok(json!("fresh")), |_| {}));
        assert!(map.is_empty());
    }
}
