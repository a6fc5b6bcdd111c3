// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for settings-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application chooses the exporter.
//!
//! # Metric Naming Convention
//! - `settings_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: logical operation name (`saveSettings`, `restoreBackup`, ...)
//! - `transport`: primary, fallback
//! - `outcome`: success, error, timeout, not_modified

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// REQUEST ORCHESTRATION
// ═══════════════════════════════════════════════════════════════════════════

/// Record one transport attempt and its outcome
pub fn record_attempt(operation: &str, transport: &str, outcome: &str) {
    counter!(
        "settings_sync_attempts_total",
        "operation" => operation.to_string(),
        "transport" => transport.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record attempt latency
pub fn record_attempt_latency(operation: &str, transport: &str, duration: Duration) {
    histogram!(
        "settings_sync_attempt_seconds",
        "operation" => operation.to_string(),
        "transport" => transport.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the final result of an `execute` call
pub fn record_request(operation: &str, outcome: &str) {
    counter!(
        "settings_sync_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_retry(operation: &str) {
    counter!("settings_sync_retries_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_fallback(operation: &str) {
    counter!("settings_sync_fallbacks_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_dedup_hit(operation: &str) {
    counter!("settings_sync_dedup_hits_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_deprecated_endpoint(transport: &str, path: &str) {
    counter!(
        "settings_sync_deprecated_endpoint_total",
        "transport" => transport.to_string(),
        "path" => path.to_string()
    )
    .increment(1);
}

/// Primary transport demoted (1) or restored (0)
pub fn set_primary_demoted(demoted: bool) {
    gauge!("settings_sync_primary_demoted").set(if demoted { 1.0 } else { 0.0 });
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

pub fn record_cache_lookup(hit: bool) {
    counter!(
        "settings_sync_cache_lookups_total",
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

pub fn record_cache_eviction(count: usize) {
    counter!("settings_sync_cache_evictions_total").increment(count as u64);
}

pub fn record_cache_invalidation(prefix: &str, count: usize) {
    counter!(
        "settings_sync_cache_invalidations_total",
        "prefix" => prefix.to_string()
    )
    .increment(count as u64);
}

pub fn set_cache_entries(count: usize) {
    gauge!("settings_sync_cache_entries").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// PREVIEW
// ═══════════════════════════════════════════════════════════════════════════

/// Outcome: applied, fallback, stale, rate_limited, error
pub fn record_preview(outcome: &str) {
    counter!("settings_sync_preview_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_preview_latency(duration: Duration) {
    histogram!("settings_sync_preview_seconds").record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// BACKUP & RESTORE
// ═══════════════════════════════════════════════════════════════════════════

pub fn record_backup_created(backup_type: &str) {
    counter!(
        "settings_sync_backups_created_total",
        "type" => backup_type.to_string()
    )
    .increment(1);
}

/// Outcome: committed, rejected, rolled_back, rollback_failed
pub fn record_restore(outcome: &str) {
    counter!("settings_sync_restores_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_backups_pruned(count: usize) {
    counter!("settings_sync_backups_pruned_total").increment(count as u64);
}
