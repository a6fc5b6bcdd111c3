//! # Settings Sync
//!
//! Client-side synchronization layer for an admin-UI settings backend.
//!
//! ## Architecture
//!
//! Every backend call goes through one orchestrator. Live preview and
//! backup/restore sit beside it and share the same error taxonomy.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Request Orchestrator                      │
//! │  • Cache lookup (TTL + LRU, ETag validators)                │
//! │  • Fingerprint dedup: one network call per logical request │
//! │  • Retry with exponential backoff, Retry-After honored     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 (preferred transport, demotion on failures)
//!                              ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────┐
//! │   Primary: REST resources    │   │  Fallback: admin-ajax    │
//! │   GET /settings, ...         │◄─►│  POST {action, payload}  │
//! └──────────────────────────────┘   └──────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Settings service (backend)                  │
//! │  • Live settings store                                     │
//! │  • Backup manager: snapshot → write → verify → rollback    │
//! │  • Stylesheet generator for previews                       │
//! └─────────────────────────────────────────────────────────────┘
//!
//!     PreviewDebouncer ── 500ms quiet period ──→ one preview request
//!                     ── newest generation only ──→ <style id="las-live-preview">
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use settings_sync::{ExecuteOptions, RequestOrchestrator, ScriptedTransport, Settings, SettingsSyncConfig};
//! use settings_sync::transport::TransportResponse;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let primary = Arc::new(ScriptedTransport::new("rest"));
//!     primary.push_response(TransportResponse::ok(json!({"menu_background": "#23282d"})));
//!     let fallback = Arc::new(ScriptedTransport::new("ajax"));
//!
//!     let orchestrator = RequestOrchestrator::new(SettingsSyncConfig::default(), primary)
//!         .with_fallback(fallback);
//!
//!     let settings: Settings = orchestrator.get_settings().await.expect("load settings");
//!     println!("{:?}", settings.get("menu_background"));
//!
//!     // Same call, explicit options
//!     let _ = orchestrator
//!         .execute("getSettings", serde_json::Value::Null, &ExecuteOptions::read().bypassing_cache())
//!         .await;
//! }
//! ```
//!
//! ## Notifications
//!
//! Preview and backup lifecycle events are published on an [`EventBus`]:
//!
//! ```rust,no_run
//! # use settings_sync::events::{Event, EventBus, Notification};
//! # async fn example(bus: EventBus) {
//! let mut rx = bus.subscribe();
//! while let Ok(Notification { event, .. }) = rx.recv().await {
//!     if let Event::BackupRestored { backup_id, .. } = event {
//!         println!("restored {backup_id}");
//!     }
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`]: [`RequestOrchestrator`] and per-call [`ExecuteOptions`]
//! - [`transport`]: transport trait, route adapters, status classification
//! - [`resilience`]: retry backoff and transport preference
//! - [`cache`]: response cache and request fingerprints
//! - [`preview`]: debounced live preview
//! - [`backup`]: backups, retention and transactional restore
//! - [`storage`]: settings and snapshot stores
//! - [`service`]: in-process backend speaking both transport shapes

pub mod backup;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod preview;
pub mod resilience;
pub mod service;
pub mod settings;
pub mod storage;
pub mod transport;

pub use backup::{Backup, BackupManager, BackupMetadata, BackupSummary, BackupType, RestorePhase, RestoreResult};
pub use cache::{CacheStats, CacheStore, FingerprintGenerator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SettingsSyncConfig;
pub use error::{ErrorKind, SyncError};
pub use events::{Event, EventBus, Notification};
pub use orchestrator::{ExecuteOptions, OrchestratorStats, RequestOrchestrator};
pub use preview::{CssGenerator, PreviewDebouncer, PreviewSource, StyleElement, StyleSink};
pub use resilience::{RetryPolicy, TransportPreference};
pub use service::SettingsService;
pub use settings::Settings;
pub use storage::{InMemorySettingsStore, InMemorySnapshotStore, SettingsStore, SnapshotStore, StorageError};
pub use transport::{ScriptedTransport, Transport, TransportKind, TransportRequest, TransportResponse};
