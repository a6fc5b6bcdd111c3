//! Configuration for settings-sync.
//!
//! # Example
//!
//! ```
//! use settings_sync::SettingsSyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SettingsSyncConfig::default();
//! assert_eq!(config.preview_debounce_ms, 500);
//! assert_eq!(config.max_automatic_backups, 10);
//!
//! // Tuned config
//! let config = SettingsSyncConfig {
//!     cache_ttl_ms: 60_000,
//!     default_max_retries: 1,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the orchestrator, preview debouncer and backup manager.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSyncConfig {
    /// How long a cached read stays fresh (default: 5 minutes)
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Cache size bound; oldest-inserted entries are evicted first
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Width of the dedup time bucket folded into request fingerprints
    #[serde(default = "default_fingerprint_bucket_ms")]
    pub fingerprint_bucket_ms: u64,

    /// Retry backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Per-call defaults used by [`ExecuteOptions`](crate::ExecuteOptions) presets
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Consecutive retryable primary failures before the primary transport
    /// is demoted behind the fallback
    #[serde(default = "default_demotion_threshold")]
    pub demotion_threshold: u32,

    /// Quiet period before a preview request is dispatched
    #[serde(default = "default_preview_debounce_ms")]
    pub preview_debounce_ms: u64,

    /// Automatic backups kept by the retention policy (manual are exempt)
    #[serde(default = "default_max_automatic_backups")]
    pub max_automatic_backups: usize,

    /// Recorded in backup metadata
    #[serde(default = "default_tool_version")]
    pub tool_version: String,
    #[serde(default = "default_environment_version")]
    pub environment_version: String,
}

fn default_cache_ttl_ms() -> u64 { 5 * 60 * 1000 } // 5 min
fn default_cache_max_entries() -> usize { 100 }
fn default_fingerprint_bucket_ms() -> u64 { 10_000 }
fn default_retry_base_delay_ms() -> u64 { 1_000 }
fn default_retry_max_delay_ms() -> u64 { 30_000 }
fn default_max_retries() -> u32 { 3 }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_demotion_threshold() -> u32 { 5 }
fn default_preview_debounce_ms() -> u64 { 500 }
fn default_max_automatic_backups() -> usize { 10 }
fn default_tool_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_environment_version() -> String { "unknown".to_string() }

impl Default for SettingsSyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            fingerprint_bucket_ms: default_fingerprint_bucket_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            default_max_retries: default_max_retries(),
            default_timeout_ms: default_timeout_ms(),
            demotion_threshold: default_demotion_threshold(),
            preview_debounce_ms: default_preview_debounce_ms(),
            max_automatic_backups: default_max_automatic_backups(),
            tool_version: default_tool_version(),
            environment_version: default_environment_version(),
        }
    }
}

impl SettingsSyncConfig {
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    #[must_use]
    pub fn preview_debounce(&self) -> Duration {
        Duration::from_millis(self.preview_debounce_ms)
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
