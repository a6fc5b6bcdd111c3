// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic settings-sync usage example.
//!
//! Demonstrates, fully in-process:
//! 1. Wiring the settings service behind a primary and a fallback transport
//! 2. Deduplicated, cached reads
//! 3. Saving through a flaky primary (fallback kicks in)
//! 4. Debounced live preview
//! 5. Backup, mutate, restore
//! 6. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use settings_sync::preview::{CustomPropertyGenerator, OrchestratedSource};
use settings_sync::transport::TransportError;
use settings_sync::{
    BackupManager, InMemorySettingsStore, InMemorySnapshotStore, PreviewDebouncer, RequestOrchestrator, Settings,
    SettingsService, SettingsSyncConfig, StyleElement, Transport, TransportRequest, TransportResponse,
};

/// Refuses the first few connections, then forwards to the service.
struct FlakyPrimary {
    inner: Arc<SettingsService>,
    refusals: AtomicU32,
}

#[async_trait]
impl Transport for FlakyPrimary {
    fn name(&self) -> &str {
        "rest"
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        if self.refusals.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(TransportError::Connect("connection refused".into()));
        }
        self.inner.send(request).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().map_err(|_| "failed to install metrics recorder")?;

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           settings-sync: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Wire the stack
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Wiring service, backups and orchestrator...");

    let config = SettingsSyncConfig::default();
    let initial = Settings::from_value(json!({
        "menu_background": "#23282d",
        "menu_text_color": "#eeeeee",
        "menu_width": 160,
    }))?;
    let store = Arc::new(InMemorySettingsStore::with_settings(initial.clone()));
    let backups = Arc::new(BackupManager::new(&config, store.clone(), Arc::new(InMemorySnapshotStore::new())));
    let service = Arc::new(
        SettingsService::new(store.clone(), backups, Arc::new(CustomPropertyGenerator))
            .with_defaults(initial)
            .with_latency(Duration::from_millis(20)),
    );

    // The primary refuses its first three connections
    let primary = Arc::new(FlakyPrimary { inner: service.clone(), refusals: AtomicU32::new(3) });
    let orchestrator = Arc::new(RequestOrchestrator::new(config.clone(), primary).with_fallback(service.clone()));

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Concurrent reads collapse into one request
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Five concurrent reads while the primary is flaky...");
    let start = Instant::now();
    let reads = futures_join(&orchestrator, 5).await;
    println!("   └─ {} reads ok in {:?}", reads, start.elapsed());
    println!("   └─ backend requests: {}", service.request_count());

    let start = Instant::now();
    orchestrator.get_settings().await?;
    println!("   ⚡ cached read: {:?}", start.elapsed());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Save
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Saving a patch...");
    orchestrator.save_settings(&Settings::from_value(json!({"menu_background": "#0a84ff"}))?).await?;
    println!("   └─ live: {}", store.snapshot().to_value());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Live preview
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🎨 Typing into the color picker...");
    let sink = Arc::new(StyleElement::default());
    let debouncer =
        PreviewDebouncer::new(Arc::new(OrchestratedSource::new(orchestrator.clone())), sink.clone(), config.preview_debounce());
    for shade in ["#111111", "#222222", "#333333"] {
        debouncer.submit(&Settings::from_value(json!({"menu_text_color": shade}))?);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(config.preview_debounce() * 2).await;
    println!("   └─ stylesheet after {} edits:\n{}", debouncer.generation(), sink.content());

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Backup and restore
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n💾 Backup → mutate → restore...");
    let backup = orchestrator.create_backup(Some("demo")).await?;
    orchestrator.save_settings(&Settings::from_value(json!({"menu_width": 320}))?).await?;
    let result = orchestrator.restore_backup(&backup.id).await?;
    println!("   └─ restored {} keys from {}", result.restored_keys, result.backup_id);
    println!("   └─ safety snapshot: {}", result.pre_restore_backup_id);
    for summary in orchestrator.list_backups().await? {
        println!("   └─ {} {:?} {:?}", summary.id, summary.backup_type, summary.reason);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Stats & metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Orchestrator stats: {:?}", orchestrator.stats());
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

async fn futures_join(orchestrator: &Arc<RequestOrchestrator>, n: usize) -> usize {
    let mut set = tokio::task::JoinSet::new();
    for _ in 0..n {
        let orch = Arc::clone(orchestrator);
        set.spawn(async move { orch.get_settings().await });
    }
    let mut ok = 0;
    while let Some(joined) = set.join_next().await {
        if matches!(joined, Ok(Ok(_))) {
            ok += 1;
        }
    }
    ok
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = Vec::new();
    let mut gauges = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let name = format!("{}{}", key.name(), label_str);

        match value {
            DebugValue::Counter(v) => counters.push((name, v)),
            DebugValue::Gauge(v) => gauges.push((name, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, samples.len(), sum));
            }
        }
    }
    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    println!("   ┌─ Counters");
    for (name, value) in &counters {
        println!("   │  └─ {name} = {value}");
    }
    println!("   ├─ Gauges");
    for (name, value) in &gauges {
        println!("   │  └─ {name} = {value:.2}");
    }
    println!("   └─ Histograms");
    for (name, count, sum) in &histograms {
        println!("      └─ {name} count={count} sum={sum:.4}");
    }
}
