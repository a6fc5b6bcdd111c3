// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy shared by the orchestrator, preview and backup layers.
//!
//! Every failure carries a structured [`ErrorKind`] so callers can map it to
//! a message without string matching. Kinds split into two classes:
//!
//! - **Retryable**: `Network`, `Timeout`, `RateLimited`, `Generation`.
//!   The orchestrator retries these with backoff and may hand them to the
//!   fallback transport.
//! - **Terminal**: `Permission`, `Validation`, `NotFound`, `Storage`,
//!   `InvalidRequest`, `Cancelled`. These are definitive answers and are
//!   never retried nor sent to the fallback transport.
//!
//! `SyncError` is `Clone` because one result is fanned out to every caller
//! that shares a request fingerprint.

use serde::Serialize;
use thiserror::Error;

use crate::transport::TransportKind;

/// Structured error kind, preserved end-to-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimited,
    Permission,
    Validation,
    NotFound,
    Storage,
    Generation,
    Cancelled,
    InvalidRequest,
    /// Retries against one transport ran out
    Exhausted,
    /// Primary retries and the fallback attempt all failed
    BothFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
            Self::Generation => "generation",
            Self::Cancelled => "cancelled",
            Self::InvalidRequest => "invalid_request",
            Self::Exhausted => "exhausted",
            Self::BothFailed => "both_failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network error: {message}")]
    Network { status: Option<u16>, message: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("rate limited by server")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("permission denied (status {status}): {message}")]
    Permission { status: u16, message: String },

    #[error("validation failed: {}", .problems.join("; "))]
    Validation { problems: Vec<String> },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("stylesheet generation failed: {0}")]
    Generation(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("retries exhausted after {attempts} attempt(s) via {}: {source}", transport_list(.transports))]
    Exhausted {
        attempts: u32,
        transports: Vec<TransportKind>,
        #[source]
        source: Box<SyncError>,
    },

    #[error("all transports failed ({}): {source}", transport_list(.transports))]
    BothFailed {
        transports: Vec<TransportKind>,
        /// Last error seen on the preferred transport before falling back
        preferred_error: Box<SyncError>,
        #[source]
        source: Box<SyncError>,
    },
}

fn transport_list(transports: &[TransportKind]) -> String {
    transports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl SyncError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { status: None, message: message.into() }
    }

    pub fn validation(problems: Vec<String>) -> Self {
        Self::Validation { problems }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::BothFailed { .. } => ErrorKind::BothFailed,
        }
    }

    /// Kind of the innermost error, looking through `Exhausted`/`BothFailed`.
    #[must_use]
    pub fn root_kind(&self) -> ErrorKind {
        self.root().kind()
    }

    /// Innermost error, looking through `Exhausted`/`BothFailed`.
    #[must_use]
    pub fn root(&self) -> &SyncError {
        match self {
            Self::Exhausted { source, .. } | Self::BothFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the orchestrator may retry or fall back on this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } | Self::Generation(_)
        )
    }

    /// Definitive server/local decision: no retry, no fallback.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    /// HTTP-equivalent status, when one is known.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Self::Network { status, .. } => *status,
            Self::Timeout { .. } => Some(408),
            Self::RateLimited { .. } => Some(429),
            Self::Permission { status, .. } => Some(*status),
            Self::Validation { .. } => Some(422),
            Self::NotFound { .. } => Some(404),
            Self::Storage(_) | Self::Generation(_) => Some(500),
            Self::InvalidRequest(_) => Some(400),
            _ => None,
        }
    }

    /// Field-level problems for validation failures (empty otherwise).
    #[must_use]
    pub fn problems(&self) -> &[String] {
        match self.root() {
            Self::Validation { problems } => problems,
            _ => &[],
        }
    }

    /// Transports that were attempted before this error surfaced.
    #[must_use]
    pub fn attempted_transports(&self) -> &[TransportKind] {
        match self {
            Self::Exhausted { transports, .. } | Self::BothFailed { transports, .. } => transports,
            _ => &[],
        }
    }
}
