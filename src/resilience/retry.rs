// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry policy with exponential backoff.
//!
//! The delay before retry `n` (0-based) is `base * factor^n`, capped at
//! `max_delay`. A rate-limited answer carrying `Retry-After` stretches the
//! delay to at least the server-provided value.
//!
//! # Example
//!
//! ```
//! use settings_sync::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::standard();
//! assert_eq!(policy.delay_for(0), Duration::from_secs(1));
//! assert_eq!(policy.delay_for(2), Duration::from_secs(4));
//! assert_eq!(policy.delay_for(20), Duration::from_secs(30)); // capped
//! ```

use std::time::Duration;

use crate::config::SettingsSyncConfig;
use crate::error::SyncError;

/// Backoff parameters for the orchestrator's attempt loop.
///
/// The number of retries is a per-call option; the policy only decides how
/// long to wait between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// 1s base, doubling, capped at 30s.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }

    /// Quick backoff for interactive calls: 100ms base, capped at 2s.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Millisecond delays for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    #[must_use]
    pub fn from_config(config: &SettingsSyncConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms.max(config.retry_base_delay_ms)),
            factor: 2.0,
        }
    }

    /// Backoff before retry number `attempt` (0 = first retry).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Past 2^30 the cap has long since been reached
        let exp = attempt.min(30) as i32;
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exp);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    /// Backoff after `error`, honoring a server `Retry-After` hint.
    #[must_use]
    pub fn delay_after(&self, attempt: u32, error: &SyncError) -> Duration {
        let backoff = self.delay_for(attempt);
        match error.root() {
            SyncError::RateLimited { retry_after_secs: Some(secs) } => backoff.max(Duration::from_secs(*secs)),
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_exponential_backoff() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 10.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_stretches_delay() {
        let policy = RetryPolicy::immediate();
        let limited = SyncError::RateLimited { retry_after_secs: Some(3) };
        assert_eq!(policy.delay_after(0, &limited), Duration::from_secs(3));

        let no_hint = SyncError::RateLimited { retry_after_secs: None };
        assert_eq!(policy.delay_after(0, &no_hint), Duration::from_millis(1));
    }

    #[test]
    fn test_from_config() {
        let config = SettingsSyncConfig {
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 1_000,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1_000));
    }

    #[test]
    fn test_presets() {
        assert!(RetryPolicy::quick().base_delay < RetryPolicy::standard().base_delay);
        assert!(RetryPolicy::immediate().max_delay <= Duration::from_millis(10));
    }
}
