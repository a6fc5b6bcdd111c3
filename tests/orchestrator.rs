//! End-to-end orchestrator behavior against the in-process service.
//!
//! Run with: `cargo test --test orchestrator`

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinSet;

use common::{settings, Harness};
use settings_sync::transport::routes::ops;
use settings_sync::{ErrorKind, ExecuteOptions, SyncError, TransportKind};

// =============================================================================
// Deduplication & caching
// =============================================================================

#[tokio::test(start_paused = true)]
async fn happy_concurrent_identical_reads_share_one_request() {
    let h = Harness::builder().latency(Duration::from_millis(50)).build();

    let mut set = JoinSet::new();
    for _ in 0..10 {
        let orch = Arc::clone(&h.orchestrator);
        set.spawn(async move { orch.execute(ops::GET_SETTINGS, Value::Null, &ExecuteOptions::read()).await });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        results.push(joined.unwrap().unwrap());
    }

    assert_eq!(h.service.request_count(), 1, "one network call for ten callers");
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    let stats = h.orchestrator.stats();
    assert_eq!(stats.dedup_hits, 9);
    assert_eq!(stats.pending, 0);
}

#[tokio::test(start_paused = true)]
async fn happy_different_payloads_are_not_merged() {
    let h = Harness::builder().latency(Duration::from_millis(50)).build();
    let backup = h.orchestrator.create_backup(Some("a")).await.unwrap();

    let o1 = Arc::clone(&h.orchestrator);
    let o2 = Arc::clone(&h.orchestrator);
    let id = backup.id.clone();
    let (a, b) = tokio::join!(
        async move { o1.get_backup(&id).await },
        async move { o2.list_backups().await },
    );
    assert_eq!(a.unwrap().id, backup.id);
    assert_eq!(b.unwrap().len(), 1);
    assert_eq!(h.service.request_count(), 3);
}

#[tokio::test]
async fn happy_fresh_read_is_served_from_cache() {
    let h = Harness::new();
    let first = h.orchestrator.get_settings().await.unwrap();
    let second = h.orchestrator.get_settings().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.service.request_count(), 1);
    assert_eq!(h.orchestrator.stats().cache_hits, 1);
}

#[tokio::test]
async fn happy_bypass_cache_goes_to_network() {
    let h = Harness::new();
    h.orchestrator.get_settings().await.unwrap();
    h.orchestrator
        .execute(ops::GET_SETTINGS, Value::Null, &ExecuteOptions::read().bypassing_cache())
        .await
        .unwrap();
    assert_eq!(h.service.request_count(), 2);
}

#[tokio::test]
async fn happy_write_invalidates_cached_read() {
    let h = Harness::new();
    h.orchestrator.get_settings().await.unwrap();

    h.orchestrator.save_settings(&settings(json!({"menu_background": "#ff0000"}))).await.unwrap();
    let after = h.orchestrator.get_settings().await.unwrap();

    assert_eq!(after.get("menu_background"), Some(&json!("#ff0000")));
    assert_eq!(h.service.request_count(), 3);
}

#[tokio::test]
async fn happy_apply_theme_invalidates_settings() {
    let h = Harness::new();
    h.orchestrator.get_settings().await.unwrap();
    h.orchestrator.apply_theme("midnight").await.unwrap();

    let after = h.orchestrator.get_settings().await.unwrap();
    assert_eq!(after.get("menu_background"), Some(&json!("#000000")));
    // Untouched keys survive the theme merge
    assert_eq!(after.get("menu_width"), Some(&json!(160)));
}

#[tokio::test(start_paused = true)]
async fn happy_expired_entry_revalidates_with_etag() {
    let h = Harness::builder().config(|c| c.cache_ttl_ms = 1_000).build();
    let first = h.orchestrator.get_settings().await.unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    let second = h.orchestrator.get_settings().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.service.request_count(), 2);
    assert_eq!(h.orchestrator.stats().not_modified, 1);
}

// =============================================================================
// Transport preference
// =============================================================================

#[tokio::test(start_paused = true)]
async fn happy_primary_down_falls_back_to_ajax() {
    let h = Harness::new();
    h.primary.set_down(true);

    let value = h.orchestrator.get_settings().await.unwrap();
    assert_eq!(value.get("menu_width"), Some(&json!(160)));

    // 1 attempt + 2 retries on primary, then one fallback attempt
    assert_eq!(h.primary.calls(), 3);
    assert_eq!(h.fallback.calls(), 1);
    let stats = h.orchestrator.stats();
    assert_eq!(stats.fallback_successes, 1);
    assert_eq!(stats.retries, 2);
}

#[tokio::test(start_paused = true)]
async fn happy_transient_primary_failure_recovers_without_fallback() {
    let h = Harness::new();
    h.primary.fail_next(1);

    h.orchestrator.get_settings().await.unwrap();
    assert_eq!(h.primary.calls(), 2);
    assert_eq!(h.fallback.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn happy_demoted_primary_is_skipped_until_reset() {
    let h = Harness::builder().config(|c| c.demotion_threshold = 3).build();
    h.primary.set_down(true);

    h.orchestrator.get_settings().await.unwrap();
    assert!(h.orchestrator.is_primary_demoted());
    let primary_calls = h.primary.calls();

    h.primary.set_down(false);
    h.orchestrator
        .execute(ops::GET_SETTINGS, Value::Null, &ExecuteOptions::read().bypassing_cache())
        .await
        .unwrap();
    assert_eq!(h.primary.calls(), primary_calls, "demoted primary not contacted");

    h.orchestrator.reset_transport_preference();
    assert!(!h.orchestrator.is_primary_demoted());
    h.orchestrator
        .execute(ops::GET_SETTINGS, Value::Null, &ExecuteOptions::read().bypassing_cache())
        .await
        .unwrap();
    assert_eq!(h.primary.calls(), primary_calls + 1);
}

#[tokio::test(start_paused = true)]
async fn happy_deprecated_fallback_response_is_still_used() {
    let h = Harness::builder().deprecated_ajax().build();
    h.primary.set_down(true);
    let value = h.orchestrator.get_settings().await.unwrap();
    assert!(!value.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failure_both_transports_down() {
    let h = Harness::new();
    h.primary.set_down(true);
    h.fallback.set_down(true);

    let err = h.orchestrator.get_settings().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BothFailed);
    assert_eq!(err.attempted_transports(), &[TransportKind::Primary, TransportKind::Fallback]);
    assert_eq!(err.root_kind(), ErrorKind::Network);
}

#[tokio::test(start_paused = true)]
async fn failure_without_fallback_is_exhausted() {
    let h = Harness::new();
    h.primary.set_down(true);

    let err = h
        .orchestrator
        .execute(ops::GET_SETTINGS, Value::Null, &ExecuteOptions::read().without_fallback())
        .await
        .unwrap_err();
    match err {
        SyncError::Exhausted { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(h.fallback.calls(), 0);
}

// =============================================================================
// Terminal errors
// =============================================================================

#[tokio::test]
async fn failure_validation_is_not_retried() {
    let h = Harness::new();
    let err = h
        .orchestrator
        .execute(ops::SAVE_SETTINGS, json!({"menu": {"nested": true}}), &ExecuteOptions::write())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.problems().is_empty());
    assert_eq!(h.service.request_count(), 1);
    assert_eq!(h.fallback.calls(), 0);
}

#[tokio::test]
async fn failure_missing_backup_is_not_found() {
    let h = Harness::new();
    let err = h.orchestrator.get_backup("backup_0_missing").await.unwrap_err();
    assert_eq!(err, SyncError::NotFound { resource: "backups/backup_0_missing".into() });
    assert_eq!(h.service.request_count(), 1);
}

#[tokio::test]
async fn failure_unknown_operation_never_reaches_network() {
    let h = Harness::new();
    let err = h.orchestrator.execute("dropTables", Value::Null, &ExecuteOptions::write()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(h.service.request_count(), 0);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn happy_cancel_request_resolves_waiters_and_skips_cache() {
    let h = Harness::builder().latency(Duration::from_secs(1)).build();

    let orch = Arc::clone(&h.orchestrator);
    let leader = tokio::spawn(async move { orch.get_settings().await });
    let orch = Arc::clone(&h.orchestrator);
    let follower = tokio::spawn(async move { orch.get_settings().await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.orchestrator.pending_count(), 1);
    assert_eq!(h.orchestrator.cancel_request(ops::GET_SETTINGS, &Value::Null), 1);

    assert_eq!(leader.await.unwrap().unwrap_err(), SyncError::Cancelled);
    assert_eq!(follower.await.unwrap().unwrap_err(), SyncError::Cancelled);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.orchestrator.pending_count(), 0);
    assert_eq!(h.orchestrator.cache_stats().entry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn happy_cancel_all_clears_pending() {
    let h = Harness::builder().latency(Duration::from_secs(1)).build();
    let o1 = Arc::clone(&h.orchestrator);
    let o2 = Arc::clone(&h.orchestrator);
    let a = tokio::spawn(async move { o1.get_settings().await });
    let b = tokio::spawn(async move { o2.list_backups().await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.orchestrator.cancel_all(), 2);
    assert!(a.await.unwrap().is_err());
    assert!(b.await.unwrap().is_err());
    assert_eq!(h.orchestrator.stats().cancelled, 2);
}

#[tokio::test(start_paused = true)]
async fn failure_slow_response_times_out() {
    let h = Harness::builder().latency(Duration::from_secs(10)).build();
    let options = ExecuteOptions::read().with_timeout(Duration::from_millis(100)).with_max_retries(0).without_fallback();

    let err = h.orchestrator.execute(ops::GET_SETTINGS, Value::Null, &options).await.unwrap_err();
    assert_eq!(err.root_kind(), ErrorKind::Timeout);
}
