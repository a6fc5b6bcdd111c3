//! Process-local orchestrator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::transport::TransportKind;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub requests: AtomicU64,
    pub primary_successes: AtomicU64,
    pub fallback_successes: AtomicU64,
    pub failures: AtomicU64,
    pub cache_hits: AtomicU64,
    pub dedup_hits: AtomicU64,
    pub retries: AtomicU64,
    pub fallbacks: AtomicU64,
    pub cancelled: AtomicU64,
    pub not_modified: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success(&self, transport: TransportKind) {
        match transport {
            TransportKind::Primary => Self::bump(&self.primary_successes),
            TransportKind::Fallback => Self::bump(&self.fallback_successes),
        }
    }
}

/// Snapshot of orchestrator activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    /// Calls to `execute` (including cache hits and dedup joins)
    pub requests: u64,
    pub primary_successes: u64,
    pub fallback_successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    /// Callers that joined an in-flight request instead of sending one
    pub dedup_hits: u64,
    pub retries: u64,
    /// Calls that reached the single fallback attempt
    pub fallbacks: u64,
    pub cancelled: u64,
    /// `304 Not Modified` answers served from a validator
    pub not_modified: u64,
    pub pending: usize,
    pub cache_entries: usize,
    pub primary_demoted: bool,
    pub demotions: u64,
}

impl Counters {
    pub fn snapshot(&self) -> OrchestratorStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        OrchestratorStats {
            requests: load(&self.requests),
            primary_successes: load(&self.primary_successes),
            fallback_successes: load(&self.fallback_successes),
            failures: load(&self.failures),
            cache_hits: load(&self.cache_hits),
            dedup_hits: load(&self.dedup_hits),
            retries: load(&self.retries),
            fallbacks: load(&self.fallbacks),
            cancelled: load(&self.cancelled),
            not_modified: load(&self.not_modified),
            ..OrchestratorStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let c = Counters::default();
        Counters::bump(&c.requests);
        Counters::bump(&c.requests);
        c.success(TransportKind::Fallback);

        let s = c.snapshot();
        assert_eq!(s.requests, 2);
        assert_eq!(s.fallback_successes, 1);
        assert_eq!(s.primary_successes, 0);
    }
}
