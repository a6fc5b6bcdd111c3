// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Request orchestrator.
//!
//! The [`RequestOrchestrator`] is the single entry point for settings,
//! theme and backup operations. It ties together:
//! - the response cache (fresh reads never touch the network)
//! - the pending map (one transport round-trip per logical duplicate)
//! - the retry policy and transport preference (backoff, demotion)
//! - the route table (per-operation request shapes for both transports)
//!
//! # Flow
//!
//! ```text
//! execute(op, payload, options)
//!   │
//!   ├─ cacheable read + fresh entry ──────────────→ cached value
//!   │
//!   ├─ same fingerprint in flight ────────────────→ await shared result
//!   │
//!   └─ leader
//!        ├─ preferred transport: attempt 0..=max_retries
//!        │     terminal error ─────────────────────→ returned unchanged
//!        │     retryable error → backoff, retry
//!        ├─ other transport: exactly one attempt (use_fallback)
//!        └─ commit: cache store (reads) / prefix invalidation (writes)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use settings_sync::{RequestOrchestrator, SettingsSyncConfig, ExecuteOptions, ScriptedTransport};
//! use serde_json::Value;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let primary = Arc::new(ScriptedTransport::new("rest"));
//! let fallback = Arc::new(ScriptedTransport::new("admin-ajax"));
//! let orchestrator = RequestOrchestrator::new(SettingsSyncConfig::default(), primary)
//!     .with_fallback(fallback);
//!
//! let settings = orchestrator
//!     .execute("getSettings", Value::Null, &ExecuteOptions::read())
//!     .await;
//! # }
//! ```

mod api;
mod options;
mod pending;
mod stats;

pub use options::ExecuteOptions;
pub use pending::{Follower, LeaderGuard, PendingMap, SharedResult, Slot};
pub use stats::OrchestratorStats;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{cache_key, CacheStats, CacheStore, FingerprintGenerator};
use crate::clock::{Clock, SystemClock};
use crate::config::SettingsSyncConfig;
use crate::error::SyncError;
use crate::resilience::{RetryPolicy, TransportPreference};
use crate::transport::{OperationAdapter, OperationKind, RouteTable, Transport, TransportKind};

use stats::Counters;

/// A successful attempt.
struct Attempted {
    value: Value,
    etag: Option<String>,
}

/// Everything one `execute` call needs while running attempts.
struct CallContext<'a> {
    operation: &'a str,
    adapter: &'a dyn OperationAdapter,
    payload: &'a Value,
    resource: &'a str,
    cache_key: &'a str,
    options: &'a ExecuteOptions,
}

impl CallContext<'_> {
    fn is_cacheable_read(&self) -> bool {
        self.options.cacheable && self.adapter.kind() == OperationKind::Read
    }
}

pub struct RequestOrchestrator {
    config: SettingsSyncConfig,
    routes: RouteTable,
    cache: CacheStore,
    fingerprints: FingerprintGenerator,
    pending: PendingMap,
    primary: Arc<dyn Transport>,
    fallback: Option<Arc<dyn Transport>>,
    preference: TransportPreference,
    retry: RetryPolicy,
    counters: Counters,
}

impl RequestOrchestrator {
    /// Create an orchestrator over a primary transport with the standard
    /// route table.
    pub fn new(config: SettingsSyncConfig, primary: Arc<dyn Transport>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            routes: RouteTable::standard(),
            cache: CacheStore::new(config.cache_ttl(), config.cache_max_entries),
            fingerprints: FingerprintGenerator::new(config.fingerprint_bucket_ms, clock),
            pending: PendingMap::new(),
            primary,
            fallback: None,
            preference: TransportPreference::new(config.demotion_threshold),
            retry: RetryPolicy::from_config(&config),
            counters: Counters::default(),
            config,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn Transport>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Clock used for fingerprint time buckets.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.fingerprints = FingerprintGenerator::new(self.config.fingerprint_bucket_ms, clock);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SettingsSyncConfig {
        &self.config
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Default options for `operation`: cached for reads, uncached for
    /// writes, with the configured retry budget and timeout.
    #[must_use]
    pub fn options_for(&self, operation: &str) -> ExecuteOptions {
        let cacheable = self.routes.get(operation).is_some_and(|a| a.kind() == OperationKind::Read);
        ExecuteOptions::from_config(&self.config, cacheable)
    }

    /// Execute a logical operation.
    ///
    /// Identical calls (same operation, same canonical payload, same time
    /// bucket) share one in-flight request and one result.
    #[tracing::instrument(skip(self, payload, options), fields(fingerprint = tracing::field::Empty))]
    pub async fn execute(
        &self,
        operation: &str,
        payload: Value,
        options: &ExecuteOptions,
    ) -> Result<Value, SyncError> {
        Counters::bump(&self.counters.requests);
        let result = self.execute_inner(operation, &payload, options).await;
        let outcome = match &result {
            Ok(_) => "success".to_string(),
            Err(e) => e.kind().to_string(),
        };
        crate::metrics::record_request(operation, &outcome);
        if result.is_err() {
            Counters::bump(&self.counters.failures);
        }
        result
    }

    async fn execute_inner(
        &self,
        operation: &str,
        payload: &Value,
        options: &ExecuteOptions,
    ) -> Result<Value, SyncError> {
        if operation.is_empty() {
            return Err(SyncError::InvalidRequest("operation name must not be empty".into()));
        }
        options.validate()?;
        let adapter = self
            .routes
            .get(operation)
            .ok_or_else(|| SyncError::InvalidRequest(format!("unknown operation `{operation}`")))?;
        let resource = adapter.resource(payload)?;
        let key = cache_key(operation, payload);

        let ctx = CallContext {
            operation,
            adapter: adapter.as_ref(),
            payload,
            resource: &resource,
            cache_key: &key,
            options,
        };

        if ctx.is_cacheable_read() && !options.bypass_cache {
            if let Some(value) = self.cache.get(&key) {
                Counters::bump(&self.counters.cache_hits);
                debug!(operation, "Served from cache");
                return Ok(value);
            }
        }

        let fingerprint = self.fingerprints.fingerprint(&key);
        tracing::Span::current().record("fingerprint", fingerprint.as_str());

        let mut guard = match self.pending.join_or_lead(&fingerprint, &key) {
            Slot::Follower(follower) => {
                Counters::bump(&self.counters.dedup_hits);
                crate::metrics::record_dedup_hit(operation);
                debug!(operation, "Joined in-flight request");
                return follower.wait().await;
            }
            Slot::Leader(guard) => guard,
        };

        let result = tokio::select! {
            res = self.run_attempts(&ctx) => res,
            () = guard.cancelled() => Err(SyncError::Cancelled),
        };

        let shared = result.as_ref().map(|a| a.value.clone()).map_err(Clone::clone);
        let committed = guard.complete(shared, |_| {
            if let Ok(attempted) = &result {
                self.commit(&ctx, attempted);
            }
        });

        if !committed {
            Counters::bump(&self.counters.cancelled);
            debug!(operation, "Completion ignored, request was cancelled");
            return Err(SyncError::Cancelled);
        }
        result.map(|a| a.value)
    }

    /// Cache side effects of a successful call.
    fn commit(&self, ctx: &CallContext<'_>, attempted: &Attempted) {
        match ctx.adapter.kind() {
            OperationKind::Read if ctx.options.cacheable => {
                self.cache.insert(ctx.cache_key, attempted.value.clone(), attempted.etag.clone(), ctx.resource);
            }
            OperationKind::Read => {}
            OperationKind::Write => {
                for prefix in ctx.adapter.invalidates(ctx.payload) {
                    self.cache.invalidate_prefix(&prefix);
                }
            }
        }
    }

    async fn run_attempts(&self, ctx: &CallContext<'_>) -> Result<Attempted, SyncError> {
        let preferred = if self.fallback.is_some() {
            self.preference.preferred()
        } else {
            TransportKind::Primary
        };

        let max_retries = ctx.options.max_retries;
        let mut last_error = None;
        for attempt in 0..=max_retries {
            match self.attempt(preferred, ctx).await {
                Ok(attempted) => {
                    self.preference.record_success(preferred);
                    self.counters.success(preferred);
                    return Ok(attempted);
                }
                Err(err) if err.is_terminal() => return Err(err),
                Err(err) => {
                    self.preference.record_failure(preferred);
                    if attempt < max_retries {
                        let delay = self.retry.delay_after(attempt, &err);
                        warn!(
                            operation = ctx.operation,
                            transport = %preferred,
                            attempt = attempt + 1,
                            max_attempts = max_retries + 1,
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "Attempt failed, retrying"
                        );
                        Counters::bump(&self.counters.retries);
                        crate::metrics::record_retry(ctx.operation);
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| SyncError::network("no attempt was made"));
        let other = preferred.other();
        if !ctx.options.use_fallback || !self.has_transport(other) {
            return Err(SyncError::Exhausted {
                attempts: max_retries + 1,
                transports: vec![preferred],
                source: Box::new(last_error),
            });
        }

        warn!(operation = ctx.operation, transport = %other, error = %last_error, "Preferred transport exhausted, trying other transport once");
        Counters::bump(&self.counters.fallbacks);
        crate::metrics::record_fallback(ctx.operation);

        match self.attempt(other, ctx).await {
            Ok(attempted) => {
                self.preference.record_success(other);
                self.counters.success(other);
                Ok(attempted)
            }
            Err(err) if err.is_terminal() => Err(err),
            Err(err) => {
                self.preference.record_failure(other);
                Err(SyncError::BothFailed {
                    transports: vec![preferred, other],
                    preferred_error: Box::new(last_error),
                    source: Box::new(err),
                })
            }
        }
    }

    fn has_transport(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Primary => true,
            TransportKind::Fallback => self.fallback.is_some(),
        }
    }

    fn transport(&self, kind: TransportKind) -> Result<&Arc<dyn Transport>, SyncError> {
        match kind {
            TransportKind::Primary => Ok(&self.primary),
            TransportKind::Fallback => self
                .fallback
                .as_ref()
                .ok_or_else(|| SyncError::InvalidRequest("no fallback transport configured".into())),
        }
    }

    /// One round-trip on `kind`, raced against the per-attempt timeout.
    async fn attempt(&self, kind: TransportKind, ctx: &CallContext<'_>) -> Result<Attempted, SyncError> {
        let transport = self.transport(kind)?;
        let mut request = ctx.adapter.request(kind, ctx.payload)?;

        let validator = if ctx.is_cacheable_read() { self.cache.validator(ctx.cache_key) } else { None };
        if let Some((etag, _)) = &validator {
            request = request.with_header("If-None-Match", etag.clone());
        }
        let path = request.path.clone();

        let started = Instant::now();
        let timeout = ctx.options.timeout;
        let sent = tokio::time::timeout(timeout, transport.send(request)).await;
        crate::metrics::record_attempt_latency(ctx.operation, kind.as_str(), started.elapsed());

        let result = match sent {
            Err(_) => Err(SyncError::Timeout { timeout_ms: duration_ms(timeout) }),
            Ok(Err(e)) => Err(SyncError::from(e)),
            Ok(Ok(response)) => {
                if response.is_deprecated() {
                    warn!(operation = ctx.operation, transport = %kind, path = %path, "Server flagged endpoint as deprecated");
                    crate::metrics::record_deprecated_endpoint(kind.as_str(), &path);
                }
                if response.is_not_modified() {
                    match validator {
                        Some((etag, value)) => {
                            Counters::bump(&self.counters.not_modified);
                            debug!(operation = ctx.operation, "Not modified, validator reused");
                            let etag = response.etag().map(String::from).unwrap_or(etag);
                            Ok(Attempted { value, etag: Some(etag) })
                        }
                        None => Err(SyncError::Network {
                            status: Some(304),
                            message: "not modified without a cached validator".into(),
                        }),
                    }
                } else {
                    let etag = response.etag().map(String::from);
                    ctx.adapter
                        .decode(kind, response, ctx.resource)
                        .map(|value| Attempted { value, etag })
                }
            }
        };

        let outcome = match &result {
            Ok(_) => "success".to_string(),
            Err(e) => e.kind().to_string(),
        };
        crate::metrics::record_attempt(ctx.operation, kind.as_str(), &outcome);
        result
    }

    /// Cancel in-flight calls for `operation` + `payload` in any time bucket.
    ///
    /// Waiting callers receive `Cancelled`; a late transport answer does not
    /// touch the cache. Returns the number of operations cancelled.
    pub fn cancel_request(&self, operation: &str, payload: &Value) -> usize {
        let key = cache_key(operation, payload);
        let n = self.pending.cancel_key(&key);
        if n > 0 {
            debug!(operation, cancelled = n, "Request cancelled");
        }
        n
    }

    pub fn cancel_all(&self) -> usize {
        self.pending.cancel_all()
    }

    /// Make the primary transport preferred again after a demotion.
    pub fn reset_transport_preference(&self) {
        self.preference.reset();
    }

    #[must_use]
    pub fn is_primary_demoted(&self) -> bool {
        self.preference.is_demoted()
    }

    /// Drop cache entries read from `prefix` or any sub-path of it.
    pub fn invalidate(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(prefix)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        crate::metrics::set_cache_entries(0);
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            pending: self.pending.len(),
            cache_entries: self.cache.len(),
            primary_demoted: self.preference.is_demoted(),
            demotions: self.preference.demotions(),
            ..self.counters.snapshot()
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|t| t.name().to_string()))
            .field("routes", &self.routes)
            .field("preference", &self.preference)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{ScriptedTransport, TransportError, TransportResponse};
    use serde_json::json;

    fn config() -> SettingsSyncConfig {
        SettingsSyncConfig { retry_base_delay_ms: 1, retry_max_delay_ms: 10, ..Default::default() }
    }

    fn setup() -> (Arc<ScriptedTransport>, Arc<ScriptedTransport>, RequestOrchestrator) {
        let primary = Arc::new(ScriptedTransport::new("primary"));
        let fallback = Arc::new(ScriptedTransport::new("fallback"));
        let orch = RequestOrchestrator::new(config(), primary.clone()).with_fallback(fallback.clone());
        (primary, fallback, orch)
    }

    #[tokio::test]
    async fn test_cacheable_read_hits_cache_second_time() {
        let (primary, _, orch) = setup();
        primary.push_response(TransportResponse::ok(json!({"a": 1})));

        let opts = ExecuteOptions::read();
        assert_eq!(orch.execute("getSettings", Value::Null, &opts).await.unwrap(), json!({"a": 1}));
        assert_eq!(orch.execute("getSettings", Value::Null, &opts).await.unwrap(), json!({"a": 1}));
        assert_eq!(primary.calls(), 1);
        assert_eq!(orch.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_bypass_cache_goes_to_network() {
        let (primary, _, orch) = setup();
        primary.push_response(TransportResponse::ok(json!(1)));
        primary.push_response(TransportResponse::ok(json!(2)));

        orch.execute("getSettings", Value::Null, &ExecuteOptions::read()).await.unwrap();
        let fresh = orch
            .execute("getSettings", Value::Null, &ExecuteOptions::read().bypassing_cache())
            .await
            .unwrap();
        assert_eq!(fresh, json!(2));
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_write_invalidates_resource() {
        let (primary, _, orch) = setup();
        primary.push_response(TransportResponse::ok(json!({"a": 1})));
        primary.push_response(TransportResponse::ok(json!({"saved": true})));
        primary.push_response(TransportResponse::ok(json!({"a": 2})));

        orch.execute("getSettings", Value::Null, &ExecuteOptions::read()).await.unwrap();
        orch.execute("saveSettings", json!({"a": 2}), &ExecuteOptions::write()).await.unwrap();
        let after = orch.execute("getSettings", Value::Null, &ExecuteOptions::read()).await.unwrap();
        assert_eq!(after, json!({"a": 2}));
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried_nor_fallen_back() {
        let (primary, fallback, orch) = setup();
        primary.push_response(TransportResponse::new(403, json!({"message": "nope"})));

        let err = orch.execute("saveSettings", json!({}), &ExecuteOptions::write()).await.unwrap_err();
        assert_eq!(err, SyncError::Permission { status: 403, message: "nope".into() });
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_fallback_success() {
        let (primary, fallback, orch) = setup();
        for _ in 0..3 {
            primary.push_error(TransportError::Reset("x".into()));
        }
        fallback.push_response(TransportResponse::ok(json!({"success": true, "data": {"ok": 1}})));

        let opts = ExecuteOptions::write().with_max_retries(2);
        let value = orch.execute("saveSettings", json!({"a": 1}), &opts).await.unwrap();
        assert_eq!(value, json!({"ok": 1}));
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(orch.stats().fallback_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_failed_annotates_transports() {
        let (_primary, fallback, orch) = setup();
        fallback.push_error(TransportError::Connect("down".into()));

        let opts = ExecuteOptions::write().with_max_retries(1);
        let err = orch.execute("saveSettings", json!({}), &opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BothFailed);
        assert_eq!(err.attempted_transports(), &[TransportKind::Primary, TransportKind::Fallback]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_fallback() {
        let primary = Arc::new(ScriptedTransport::new("primary"));
        let orch = RequestOrchestrator::new(config(), primary.clone());

        let opts = ExecuteOptions::write().with_max_retries(2);
        let err = orch.execute("saveSettings", json!({}), &opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exhausted);
        assert_eq!(err.root_kind(), ErrorKind::Network);
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let primary = Arc::new(
            ScriptedTransport::new("slow")
                .with_latency(Duration::from_secs(5))
                .with_responder(|_| Ok(TransportResponse::ok(json!(1)))),
        );
        let orch = RequestOrchestrator::new(config(), primary.clone());

        let opts = ExecuteOptions::read().with_max_retries(0).with_timeout(Duration::from_millis(100));
        let err = orch.execute("getSettings", Value::Null, &opts).await.unwrap_err();
        assert_eq!(err.root(), &SyncError::Timeout { timeout_ms: 100 });
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        let (primary, _, orch) = setup();
        let err = orch.execute("launchRocket", Value::Null, &ExecuteOptions::read()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        let err = orch.execute("", Value::Null, &ExecuteOptions::read()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_modified_reuses_validator() {
        let (primary, _, orch) = setup();
        primary.push_response(TransportResponse::ok(json!({"a": 1})).with_header("ETag", "\"v1\""));
        primary.push_response(TransportResponse::not_modified().with_header("ETag", "\"v1\""));

        let opts = ExecuteOptions::read().bypassing_cache();
        orch.execute("getSettings", Value::Null, &opts).await.unwrap();
        let value = orch.execute("getSettings", Value::Null, &opts).await.unwrap();

        assert_eq!(value, json!({"a": 1}));
        assert_eq!(primary.last_request().unwrap().header("if-none-match"), Some("\"v1\""));
        assert_eq!(orch.stats().not_modified, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demotion_prefers_fallback_until_reset() {
        let primary = Arc::new(ScriptedTransport::new("primary"));
        let fallback = Arc::new(
            ScriptedTransport::new("fallback")
                .with_responder(|_| Ok(TransportResponse::ok(json!({"success": true, "data": 1})))),
        );
        let cfg = SettingsSyncConfig { demotion_threshold: 2, ..config() };
        let orch = RequestOrchestrator::new(cfg, primary.clone()).with_fallback(fallback.clone());

        let opts = ExecuteOptions::write().with_max_retries(1);
        orch.execute("saveSettings", json!({"n": 1}), &opts).await.unwrap();
        assert!(orch.is_primary_demoted());
        assert_eq!(primary.calls(), 2);

        // Demoted: fallback answers first, primary untouched
        orch.execute("saveSettings", json!({"n": 2}), &opts).await.unwrap();
        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 2);

        orch.reset_transport_preference();
        assert!(!orch.is_primary_demoted());
    }
}
