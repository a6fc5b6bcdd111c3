// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transport preference with demotion.
//!
//! Tracks consecutive retryable failures of the primary transport. Once the
//! count reaches the threshold the primary is **demoted**: the fallback
//! becomes the preferred transport for every later call, and stays so until
//! [`TransportPreference::reset`] is called explicitly. There is no
//! automatic half-open probe.
//!
//! States:
//! - Preferred: primary first, fallback as the single last resort
//! - Demoted: fallback first, primary as the single last resort

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use tracing::{info, warn};

use crate::transport::TransportKind;

pub struct TransportPreference {
    threshold: u32,
    consecutive_failures: AtomicU32,
    demoted: AtomicBool,
    demotions: AtomicU64,
}

impl TransportPreference {
    /// A threshold of 0 disables demotion.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: AtomicU32::new(0),
            demoted: AtomicBool::new(false),
            demotions: AtomicU64::new(0),
        }
    }

    /// Transport tried first.
    #[must_use]
    pub fn preferred(&self) -> TransportKind {
        if self.is_demoted() {
            TransportKind::Fallback
        } else {
            TransportKind::Primary
        }
    }

    #[must_use]
    pub fn is_demoted(&self) -> bool {
        self.demoted.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Number of times the primary has been demoted.
    #[must_use]
    pub fn demotions(&self) -> u64 {
        self.demotions.load(Ordering::Relaxed)
    }

    /// A primary attempt succeeded; the failure streak ends.
    pub fn record_success(&self, transport: TransportKind) {
        if transport == TransportKind::Primary {
            self.consecutive_failures.store(0, Ordering::SeqCst);
        }
    }

    /// A primary attempt failed with a retryable error.
    ///
    /// Returns `true` if this failure demoted the primary.
    pub fn record_failure(&self, transport: TransportKind) -> bool {
        if transport != TransportKind::Primary || self.threshold == 0 {
            return false;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.threshold && !self.demoted.swap(true, Ordering::SeqCst) {
            self.demotions.fetch_add(1, Ordering::Relaxed);
            warn!(failures, threshold = self.threshold, "Primary transport demoted, preferring fallback");
            crate::metrics::set_primary_demoted(true);
            return true;
        }
        false
    }

    /// Restore the primary as preferred and clear the failure streak.
    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        if self.demoted.swap(false, Ordering::SeqCst) {
            info!("Transport preference reset, primary preferred again");
        }
        crate::metrics::set_primary_demoted(false);
    }
}

impl std::fmt::Debug for TransportPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportPreference")
            .field("threshold", &self.threshold)
            .field("consecutive_failures", &self.consecutive_failures())
            .field("demoted", &self.is_demoted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demotes_at_threshold() {
        let pref = TransportPreference::new(3);
        assert!(!pref.record_failure(TransportKind::Primary));
        assert!(!pref.record_failure(TransportKind::Primary));
        assert_eq!(pref.preferred(), TransportKind::Primary);

        assert!(pref.record_failure(TransportKind::Primary));
        assert!(pref.is_demoted());
        assert_eq!(pref.preferred(), TransportKind::Fallback);
        assert_eq!(pref.demotions(), 1);

        // Further failures do not count as new demotions
        assert!(!pref.record_failure(TransportKind::Primary));
        assert_eq!(pref.demotions(), 1);
    }

    #[test]
    fn test_success_resets_streak() {
        let pref = TransportPreference::new(2);
        pref.record_failure(TransportKind::Primary);
        pref.record_success(TransportKind::Primary);
        pref.record_failure(TransportKind::Primary);
        assert!(!pref.is_demoted());
        assert_eq!(pref.consecutive_failures(), 1);
    }

    #[test]
    fn test_fallback_failures_do_not_count() {
        let pref = TransportPreference::new(1);
        assert!(!pref.record_failure(TransportKind::Fallback));
        assert!(!pref.is_demoted());
    }

    #[test]
    fn test_demotion_sticks_until_reset() {
        let pref = TransportPreference::new(1);
        pref.record_failure(TransportKind::Primary);
        // A later primary success (e.g. as last resort) does not restore it
        pref.record_success(TransportKind::Primary);
        assert!(pref.is_demoted());

        pref.reset();
        assert!(!pref.is_demoted());
        assert_eq!(pref.preferred(), TransportKind::Primary);
        assert_eq!(pref.consecutive_failures(), 0);
    }

    #[test]
    fn test_zero_threshold_disables_demotion() {
        let pref = TransportPreference::new(0);
        for _ in 0..10 {
            pref.record_failure(TransportKind::Primary);
        }
        assert!(!pref.is_demoted());
    }
}
