// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Response cache with TTL freshness and a size bound.
//!
//! # Flow
//!
//! ```text
//! Cacheable read arrives
//!       │
//!       ▼
//! ┌──────────────────────────────┐
//! │  lookup by cache key         │
//! │  fresh? (age < ttl)          │
//! └──────────────────────────────┘
//!       │
//!       ├─→ fresh → return value, no network
//!       │
//!       └─→ missing OR expired → network call
//!                                 (expired entry's ETag is still offered
//!                                  as a validator: If-None-Match)
//! ```
//!
//! Expired entries are never returned as fresh values; they linger only as
//! ETag validators until evicted. Eviction is oldest-inserted first, driven
//! by an insertion-ordered index of `(sequence, key)` pairs so no scan is
//! needed. Re-inserting a key gives it a new sequence number; the stale pair
//! left behind in the index is skipped when it reaches the front.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A cached response.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub stored_at: Instant,
    pub etag: Option<String>,
    /// Resource path this entry was read from (used for invalidation)
    pub resource: String,
    seq: u64,
}

impl CacheEntry {
    #[must_use]
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an entry older than the TTL
    pub expired: u64,
    pub evictions: u64,
    pub entry_count: usize,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    /// Insertion order for eviction (oldest first)
    order: Mutex<VecDeque<(u64, String)>>,
    next_seq: AtomicU64,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(0),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, or `None` if missing or older than the TTL.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_cache_lookup(true);
                return Some(entry.value.clone());
            }
            self.expired.fetch_add(1, Ordering::Relaxed);
            debug!(key, age_ms = entry.age().as_millis() as u64, "Cache entry expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_lookup(false);
        None
    }

    /// ETag and body of the stored entry regardless of freshness.
    ///
    /// Used to build conditional requests; a `304 Not Modified` answer
    /// revalidates the body.
    #[must_use]
    pub fn validator(&self, key: &str) -> Option<(String, Value)> {
        let entry = self.entries.get(key)?;
        let etag = entry.etag.clone()?;
        Some((etag, entry.value.clone()))
    }

    /// Store a response, evicting the oldest entries if at capacity.
    pub fn insert(&self, key: impl Into<String>, value: Value, etag: Option<String>, resource: impl Into<String>) {
        let key = key.into();
        let mut order = self.order.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        if !self.entries.contains_key(&key) {
            let mut evicted = 0;
            while self.entries.len() >= self.max_entries {
                let Some((old_seq, old_key)) = order.pop_front() else {
                    break;
                };
                if self.entries.remove_if(&old_key, |_, e| e.seq == old_seq).is_some() {
                    evicted += 1;
                }
            }
            if evicted > 0 {
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
                crate::metrics::record_cache_eviction(evicted as usize);
            }
        }

        self.entries.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                value,
                stored_at: Instant::now(),
                etag,
                resource: resource.into(),
                seq,
            },
        );
        order.push_back((seq, key));

        // Drop index pairs left behind by overwrites and removals
        if order.len() > self.max_entries * 2 {
            order.retain(|(s, k)| self.entries.get(k).is_some_and(|e| e.seq == *s));
        }
        crate::metrics::set_cache_entries(self.entries.len());
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry read from `prefix` or a sub-path of it.
    /// An empty prefix clears everything. Returns the number removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| resource_matches(&e.resource, prefix))
            .map(|e| e.key().clone())
            .collect();

        let removed = keys.iter().filter(|k| self.entries.remove(k.as_str()).is_some()).count();
        if removed > 0 {
            debug!(prefix, removed, "Cache entries invalidated");
            crate::metrics::record_cache_invalidation(prefix, removed);
        }
        removed
    }

    /// Drop entries older than the TTL (including their validators).
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        let mut order = self.order.lock();
        self.entries.clear();
        order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            expired: self.expired.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.entries.len(),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }
}

/// Path-segment prefix match: `settings` matches `settings` and
/// `settings/menu` but not `settings_extra`.
fn resource_matches(resource: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match resource.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
