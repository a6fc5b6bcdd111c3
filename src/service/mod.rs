// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process settings backend.
//!
//! [`SettingsService`] implements [`Transport`] and answers both wire
//! shapes the orchestrator speaks:
//!
//! ```text
//!   REST                         admin-ajax
//!   GET /settings                POST /admin-ajax {action: las_get_settings}
//!        │                               │
//!        └──────── parse_rest / parse_ajax ┘
//!                        │
//!                      Call ──→ handle() ──→ SettingsStore / BackupManager
//!                        │                   / theme catalog / CssGenerator
//!        ┌───────────────┴───────────────┐
//!   status + JSON body            200 + {success, data}
//!   (ETag / 304 on settings)      (optional Deprecation header)
//! ```
//!
//! Errors come back in the shape the client classifier expects: HTTP
//! statuses for REST, `{success: false, data: {code, message}}` for ajax.

mod routing;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::backup::{BackupManager, BackupType};
use crate::cache::canonical_json;
use crate::error::{ErrorKind, SyncError};
use crate::preview::CssGenerator;
use crate::settings::Settings;
use crate::storage::SettingsStore;
use crate::transport::routes::AJAX_PATH;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

use routing::{parse_ajax, parse_rest, Call};

/// Header checked against the configured nonce.
pub const NONCE_HEADER: &str = "x-wp-nonce";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Rest,
    Ajax,
}

pub struct SettingsService {
    settings: Arc<dyn SettingsStore>,
    backups: Arc<BackupManager>,
    generator: Arc<dyn CssGenerator>,
    defaults: Settings,
    themes: RwLock<BTreeMap<String, Settings>>,
    nonce: Option<String>,
    deprecate_ajax: bool,
    latency: Duration,
    requests: AtomicU64,
}

impl SettingsService {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        backups: Arc<BackupManager>,
        generator: Arc<dyn CssGenerator>,
    ) -> Self {
        Self {
            settings,
            backups,
            generator,
            defaults: Settings::new(),
            themes: RwLock::new(BTreeMap::new()),
            nonce: None,
            deprecate_ajax: false,
            latency: Duration::ZERO,
            requests: AtomicU64::new(0),
        }
    }

    /// Settings written by `resetSettings`.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Settings) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_theme(self, id: impl Into<String>, settings: Settings) -> Self {
        self.themes.write().insert(id.into(), settings);
        self
    }

    /// Reject requests whose nonce header does not match with 403.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Flag every admin-ajax response with a `Deprecation` header.
    #[must_use]
    pub fn with_deprecated_ajax(mut self, deprecated: bool) -> Self {
        self.deprecate_ajax = deprecated;
        self
    }

    /// Delay every response, so concurrent callers overlap.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn backups(&self) -> &Arc<BackupManager> {
        &self.backups
    }

    /// Requests received, in either shape.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    async fn handle(&self, call: Call) -> Result<Value, SyncError> {
        match call {
            Call::GetSettings => Ok(self.settings.read().await?.into_value()),
            Call::SaveSettings(patch) => {
                let patch = Settings::from_value(patch)?;
                let mut live = self.settings.read().await?;
                live.merge(&patch);
                self.settings.write(&live).await?;
                Ok(live.into_value())
            }
            Call::ResetSettings => {
                self.settings.write(&self.defaults).await?;
                Ok(self.defaults.to_value())
            }
            Call::ListThemes => {
                let themes: Vec<Value> = self
                    .themes
                    .read()
                    .iter()
                    .map(|(id, settings)| json!({ "id": id, "settings": settings }))
                    .collect();
                Ok(Value::Array(themes))
            }
            Call::ApplyTheme(id) => {
                let theme = self
                    .themes
                    .read()
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| SyncError::not_found(format!("themes/{id}")))?;
                let mut live = self.settings.read().await?;
                live.merge(&theme);
                self.settings.write(&live).await?;
                Ok(live.into_value())
            }
            Call::CreateBackup { note } => encode(&self.backups.create_backup(BackupType::Manual, note).await?),
            Call::ListBackups => encode(&self.backups.list_backups().await?),
            Call::GetBackup(id) => encode(&self.backups.get_backup(&id).await?),
            Call::RestoreBackup(id) => encode(&self.backups.restore_backup(&id).await?),
            Call::DeleteBackup(id) => {
                self.backups.delete_backup(&id).await?;
                Ok(json!({ "deleted": id }))
            }
            Call::CleanupBackups => Ok(json!({ "deleted": self.backups.cleanup_old_backups().await? })),
            Call::GeneratePreview(payload) => {
                let settings = Settings::from_value(payload.get("settings").cloned().unwrap_or(Value::Null))?;
                Ok(json!({ "css": self.generator.generate(&settings)? }))
            }
        }
    }

    fn nonce_ok(&self, request: &TransportRequest) -> bool {
        match &self.nonce {
            Some(expected) => request.header(NONCE_HEADER) == Some(expected.as_str()),
            None => true,
        }
    }
}

#[async_trait]
impl Transport for SettingsService {
    fn name(&self) -> &str {
        "settings-service"
    }

    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let shape = if request.path == AJAX_PATH { Shape::Ajax } else { Shape::Rest };
        let parsed = match shape {
            Shape::Ajax => parse_ajax(&request).map(Some),
            Shape::Rest => Ok(parse_rest(&request)),
        };

        let response = match parsed {
            Ok(None) => TransportResponse::new(404, json!({ "code": "no_route", "message": "no route" })),
            Err(err) => error_response(shape, &err),
            Ok(Some(_)) if !self.nonce_ok(&request) => {
                let err = SyncError::Permission { status: 403, message: "invalid nonce".into() };
                error_response(shape, &err)
            }
            Ok(Some(call)) => {
                let name = call.name();
                let is_settings_read = call == Call::GetSettings;
                match self.handle(call).await {
                    Ok(body) if shape == Shape::Rest && is_settings_read => {
                        conditional(body, request.header("if-none-match"))
                    }
                    Ok(body) if shape == Shape::Rest => TransportResponse::ok(body),
                    Ok(body) => TransportResponse::ok(json!({ "success": true, "data": body })),
                    Err(err) => {
                        debug!(call = name, error = %err, "Service call failed");
                        error_response(shape, &err)
                    }
                }
            }
        };

        Ok(match shape {
            Shape::Ajax if self.deprecate_ajax => response.with_header("Deprecation", "true"),
            _ => response,
        })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value).map_err(|e| SyncError::Storage(format!("encode failed: {e}")))
}

/// Strong validator over the canonical body.
fn etag_of(body: &Value) -> String {
    let hash = Sha256::digest(canonical_json(body).as_bytes());
    format!("\"{}\"", hex::encode(&hash[..8]))
}

fn conditional(body: Value, if_none_match: Option<&str>) -> TransportResponse {
    let etag = etag_of(&body);
    if if_none_match == Some(etag.as_str()) {
        return TransportResponse::not_modified().with_header("ETag", etag);
    }
    TransportResponse::ok(body).with_header("ETag", etag)
}

fn code_of(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Permission => "forbidden",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Validation => "validation",
        ErrorKind::RateLimited => "rate_limited",
        ErrorKind::Storage => "storage",
        ErrorKind::Generation => "generation",
        ErrorKind::InvalidRequest => "invalid_request",
        _ => "internal",
    }
}

fn error_response(shape: Shape, err: &SyncError) -> TransportResponse {
    let kind = err.root_kind();
    let data = json!({
        "code": code_of(kind),
        "message": err.root().to_string(),
        "errors": err.problems(),
    });
    match shape {
        Shape::Ajax => TransportResponse::ok(json!({ "success": false, "data": data })),
        Shape::Rest => {
            let status = match kind {
                ErrorKind::Permission => 403,
                ErrorKind::NotFound => 404,
                ErrorKind::Validation => 422,
                ErrorKind::RateLimited => 429,
                ErrorKind::InvalidRequest => 400,
                _ => 500,
            };
            let response = TransportResponse::new(status, data);
            match err.root() {
                SyncError::RateLimited { retry_after_secs: Some(secs) } => {
                    response.with_header("Retry-After", secs.to_string())
                }
                _ => response,
            }
        }
    }
}
