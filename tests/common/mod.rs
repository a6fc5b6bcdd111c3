//! Shared fixtures for the integration suites.
//!
//! - [`FlakyTransport`]: wraps a transport and injects connection failures
//! - [`FailingSettingsStore`]: wraps the in-memory store and fails writes on
//!   chosen call numbers
//! - [`Harness`]: service + backup manager + orchestrator wired end to end

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use settings_sync::clock::{Clock, ManualClock};
use settings_sync::preview::CustomPropertyGenerator;
use settings_sync::storage::{InMemorySettingsStore, InMemorySnapshotStore, SettingsStore, StorageError};
use settings_sync::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use settings_sync::{BackupManager, EventBus, RequestOrchestrator, Settings, SettingsService, SettingsSyncConfig};

pub fn settings(value: Value) -> Settings {
    Settings::from_value(value).unwrap()
}

pub fn initial_settings() -> Settings {
    settings(json!({
        "menu_background": "#23282d",
        "menu_text_color": "#eeeeee",
        "menu_width": 160,
    }))
}

/// Config with short retry delays; tests run on paused time anyway.
pub fn test_config() -> SettingsSyncConfig {
    SettingsSyncConfig {
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 100,
        default_max_retries: 2,
        default_timeout_ms: 5_000,
        ..SettingsSyncConfig::default()
    }
}

// =============================================================================
// Failure-injecting wrappers
// =============================================================================

/// Passes requests through unless told to fail.
pub struct FlakyTransport {
    inner: Arc<dyn Transport>,
    name: String,
    calls: AtomicU64,
    down: AtomicBool,
    /// Fail this many upcoming calls, then recover
    fail_next: AtomicU64,
}

impl FlakyTransport {
    pub fn new(name: &str, inner: Arc<dyn Transport>) -> Self {
        Self {
            inner,
            name: name.to_string(),
            calls: AtomicU64::new(0),
            down: AtomicBool::new(false),
            fail_next: AtomicU64::new(0),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn fail_next(&self, n: u64) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.down.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Err(TransportError::Connect(format!("{} unreachable", self.name)));
        }
        self.inner.send(request).await
    }
}

/// Settings store whose writes fail on chosen (1-indexed) call numbers.
pub struct FailingSettingsStore {
    inner: InMemorySettingsStore,
    write_calls: AtomicU64,
    fail_on_writes: Mutex<Vec<u64>>,
    /// Return different data from reads than was written
    corrupt_reads: AtomicBool,
}

impl FailingSettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            inner: InMemorySettingsStore::with_settings(initial),
            write_calls: AtomicU64::new(0),
            fail_on_writes: Mutex::new(Vec::new()),
            corrupt_reads: AtomicBool::new(false),
        }
    }

    /// Fail the next write only; later writes (the rollback) succeed.
    pub fn fail_next_write(&self) {
        let next = self.write_calls.load(Ordering::SeqCst) + 1;
        self.fail_on_writes.lock().push(next);
    }

    /// Fail the next `n` writes.
    pub fn fail_next_writes(&self, n: u64) {
        let next = self.write_calls.load(Ordering::SeqCst) + 1;
        self.fail_on_writes.lock().extend(next..next + n);
    }

    pub fn corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    pub fn writes(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Settings {
        self.inner.snapshot()
    }
}

#[async_trait]
impl SettingsStore for FailingSettingsStore {
    async fn read(&self) -> Result<Settings, StorageError> {
        let mut settings = self.inner.read().await?;
        if self.corrupt_reads.load(Ordering::SeqCst) {
            settings.insert("__corrupted", json!(true)).map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        Ok(settings)
    }

    async fn write(&self, settings: &Settings) -> Result<(), StorageError> {
        let n = self.write_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_writes.lock().contains(&n) {
            return Err(StorageError::Backend(format!("injected failure on write #{n}")));
        }
        self.inner.write(settings).await
    }
}

// =============================================================================
// End-to-end harness
// =============================================================================

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<FailingSettingsStore>,
    pub snapshots: Arc<InMemorySnapshotStore>,
    pub events: EventBus,
    pub manager: Arc<BackupManager>,
    pub service: Arc<SettingsService>,
    /// Primary (REST) path into the service
    pub primary: Arc<FlakyTransport>,
    /// Fallback (admin-ajax) path into the same service
    pub fallback: Arc<FlakyTransport>,
    pub orchestrator: Arc<RequestOrchestrator>,
}

pub struct HarnessBuilder {
    config: SettingsSyncConfig,
    latency: Duration,
    deprecated_ajax: bool,
}

impl HarnessBuilder {
    pub fn config(mut self, f: impl FnOnce(&mut SettingsSyncConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn deprecated_ajax(mut self) -> Self {
        self.deprecated_ajax = true;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let events = EventBus::new(dyn_clock.clone());
        let store = Arc::new(FailingSettingsStore::new(initial_settings()));
        let snapshots = Arc::new(InMemorySnapshotStore::new());

        let manager = Arc::new(
            BackupManager::new(&self.config, store.clone(), snapshots.clone())
                .with_clock(dyn_clock.clone())
                .with_events(events.clone())
                .with_creator("admin"),
        );
        let service = Arc::new(
            SettingsService::new(store.clone(), manager.clone(), Arc::new(CustomPropertyGenerator))
                .with_defaults(initial_settings())
                .with_theme("midnight", settings(json!({"menu_background": "#000000", "menu_text_color": "#cccccc"})))
                .with_latency(self.latency)
                .with_deprecated_ajax(self.deprecated_ajax),
        );

        let primary = Arc::new(FlakyTransport::new("rest", service.clone()));
        let fallback = Arc::new(FlakyTransport::new("ajax", service.clone()));
        let orchestrator = Arc::new(
            RequestOrchestrator::new(self.config, primary.clone())
                .with_fallback(fallback.clone())
                .with_clock(dyn_clock),
        );

        Harness { clock, store, snapshots, events, manager, service, primary, fallback, orchestrator }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder { config: test_config(), latency: Duration::ZERO, deprecated_ajax: false }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Replace the live settings behind the service's back.
    pub async fn store_write(&self, value: Value) {
        self.store.write(&settings(value)).await.unwrap();
    }
}
