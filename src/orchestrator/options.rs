//! Per-call execution options.
//!
//! # Example
//!
//! ```rust
//! use settings_sync::ExecuteOptions;
//! use std::time::Duration;
//!
//! // Cached read with the default retry budget
//! let read = ExecuteOptions::read();
//! assert!(read.cacheable);
//!
//! // Write: never cached, one retry, 10s per attempt
//! let write = ExecuteOptions::write()
//!     .with_max_retries(1)
//!     .with_timeout(Duration::from_secs(10));
//! assert!(!write.cacheable);
//! ```

use std::time::Duration;

use crate::config::SettingsSyncConfig;
use crate::error::SyncError;

/// Options for one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Serve from and store into the response cache (reads only).
    ///
    /// Default: `true` for reads
    pub cacheable: bool,

    /// Skip the fresh-cache check and go to the network. The response
    /// still refreshes the cache when `cacheable` is set.
    pub bypass_cache: bool,

    /// Retries after the first attempt on the preferred transport.
    pub max_retries: u32,

    /// Deadline for each individual attempt.
    pub timeout: Duration,

    /// Allow one last attempt on the other transport.
    pub use_fallback: bool,
}

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::read()
    }
}

impl ExecuteOptions {
    /// Cacheable read.
    #[must_use]
    pub fn read() -> Self {
        Self {
            cacheable: true,
            bypass_cache: false,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            use_fallback: true,
        }
    }

    /// Mutation: never served from cache.
    #[must_use]
    pub fn write() -> Self {
        Self { cacheable: false, ..Self::read() }
    }

    /// Preview generation: latest-wins, so no retries and no fallback.
    #[must_use]
    pub fn preview() -> Self {
        Self {
            cacheable: false,
            bypass_cache: false,
            max_retries: 0,
            timeout: Duration::from_secs(10),
            use_fallback: false,
        }
    }

    /// Preset tuned from config (`default_max_retries`, `default_timeout_ms`).
    #[must_use]
    pub fn from_config(config: &SettingsSyncConfig, cacheable: bool) -> Self {
        Self {
            cacheable,
            bypass_cache: false,
            max_retries: config.default_max_retries,
            timeout: config.default_timeout(),
            use_fallback: true,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    #[must_use]
    pub fn without_fallback(mut self) -> Self {
        self.use_fallback = false;
        self
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.timeout.is_zero() {
            return Err(SyncError::InvalidRequest("timeout must be greater than zero".into()));
        }
        Ok(())
    }
}
