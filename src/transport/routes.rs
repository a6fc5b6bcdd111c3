// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-operation transport adapters.
//!
//! The two transports expose the same logical operations with different
//! request shapes:
//!
//! ```text
//! operation        primary (REST)                  fallback (admin-ajax)
//! ───────────────  ──────────────────────────────  ─────────────────────────────────────
//! getSettings      GET    /settings                POST /admin-ajax {action: las_get_settings}
//! saveSettings     POST   /settings                POST /admin-ajax {action: las_save_settings}
//! restoreBackup    POST   /backups/{id}/restore    POST /admin-ajax {action: las_restore_backup}
//! ...
//! ```
//!
//! Fallback responses arrive wrapped in a `{success, data}` envelope which
//! the adapter unwraps, so callers see identical values from either side.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::classify::classify_response;
use super::{Method, TransportKind, TransportRequest, TransportResponse};
use crate::error::SyncError;

/// Path of the admin-ajax endpoint used by the fallback transport.
pub const AJAX_PATH: &str = "/admin-ajax";

/// Logical operation names.
pub mod ops {
    pub const GET_SETTINGS: &str = "getSettings";
    pub const SAVE_SETTINGS: &str = "saveSettings";
    pub const RESET_SETTINGS: &str = "resetSettings";
    pub const LIST_THEMES: &str = "listThemes";
    pub const APPLY_THEME: &str = "applyTheme";
    pub const CREATE_BACKUP: &str = "createBackup";
    pub const LIST_BACKUPS: &str = "listBackups";
    pub const GET_BACKUP: &str = "getBackup";
    pub const RESTORE_BACKUP: &str = "restoreBackup";
    pub const DELETE_BACKUP: &str = "deleteBackup";
    pub const CLEANUP_BACKUPS: &str = "cleanupBackups";
    pub const GENERATE_PREVIEW: &str = "generatePreview";
}

/// Read operations may be cached; successful writes invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write,
}

/// Maps one logical operation onto both transports.
pub trait OperationAdapter: Send + Sync {
    fn kind(&self) -> OperationKind;

    /// Resource path this call reads or targets (cache tag).
    fn resource(&self, payload: &Value) -> Result<String, SyncError>;

    /// Resource prefixes invalidated after a successful write.
    fn invalidates(&self, payload: &Value) -> Vec<String>;

    fn request(&self, transport: TransportKind, payload: &Value) -> Result<TransportRequest, SyncError>;

    fn decode(
        &self,
        transport: TransportKind,
        response: TransportResponse,
        resource: &str,
    ) -> Result<Value, SyncError>;
}

/// Table-driven adapter: a REST method/path template plus an ajax action.
///
/// Path and resource templates may contain `{id}`, filled from the
/// payload's `id` field.
#[derive(Debug, Clone)]
pub struct RestRoute {
    pub kind: OperationKind,
    pub method: Method,
    pub path: String,
    pub action: String,
    pub resource: String,
    pub invalidates: Vec<String>,
}

impl RestRoute {
    pub fn read(method: Method, path: &str, action: &str, resource: &str) -> Self {
        Self {
            kind: OperationKind::Read,
            method,
            path: path.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            invalidates: Vec::new(),
        }
    }

    pub fn write(method: Method, path: &str, action: &str, resource: &str, invalidates: &[&str]) -> Self {
        Self {
            kind: OperationKind::Write,
            method,
            path: path.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            invalidates: invalidates.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn fill_template(template: &str, payload: &Value) -> Result<String, SyncError> {
    if !template.contains("{id}") {
        return Ok(template.to_string());
    }
    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::InvalidRequest("payload is missing a string `id`".into()))?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(SyncError::InvalidRequest(format!("malformed id `{id}`")));
    }
    Ok(template.replace("{id}", id))
}

impl OperationAdapter for RestRoute {
    fn kind(&self) -> OperationKind {
        self.kind
    }

    fn resource(&self, payload: &Value) -> Result<String, SyncError> {
        fill_template(&self.resource, payload)
    }

    fn invalidates(&self, _payload: &Value) -> Vec<String> {
        self.invalidates.clone()
    }

    fn request(&self, transport: TransportKind, payload: &Value) -> Result<TransportRequest, SyncError> {
        match transport {
            TransportKind::Primary => {
                let path = fill_template(&self.path, payload)?;
                let request = TransportRequest::new(self.method, path);
                let carries_body = matches!(self.method, Method::Post | Method::Put) && !payload.is_null();
                Ok(if carries_body { request.with_body(payload.clone()) } else { request })
            }
            TransportKind::Fallback => Ok(TransportRequest::new(Method::Post, AJAX_PATH)
                .with_body(json!({ "action": self.action, "payload": payload }))),
        }
    }

    fn decode(
        &self,
        transport: TransportKind,
        response: TransportResponse,
        resource: &str,
    ) -> Result<Value, SyncError> {
        let body = classify_response(response, resource)?;
        match transport {
            TransportKind::Primary => Ok(body),
            TransportKind::Fallback => unwrap_ajax_envelope(body, resource),
        }
    }
}

/// Unwrap `{success: true, data}`; map `{success: false, data: {code, ...}}`
/// onto the error taxonomy. Bodies without an envelope pass through.
pub fn unwrap_ajax_envelope(body: Value, resource: &str) -> Result<Value, SyncError> {
    let Some(success) = body.get("success").and_then(Value::as_bool) else {
        return Ok(body);
    };
    let data = body.get("data").cloned().unwrap_or(Value::Null);
    if success {
        return Ok(data);
    }

    let message = data.get("message").and_then(Value::as_str).unwrap_or("request failed").to_string();
    let code = data.get("code").and_then(Value::as_str).unwrap_or("");
    Err(match code {
        "forbidden" | "permission" => SyncError::Permission { status: 403, message },
        "not_found" => SyncError::not_found(resource),
        "validation" => {
            let problems: Vec<String> = data
                .get("errors")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default();
            SyncError::validation(if problems.is_empty() { vec![message] } else { problems })
        }
        "rate_limited" => SyncError::RateLimited { retry_after_secs: None },
        "storage" => SyncError::Storage(message),
        "generation" => SyncError::Generation(message),
        _ => SyncError::Network { status: None, message },
    })
}

/// Registry of operation adapters by name.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<dyn OperationAdapter>>,
}

impl RouteTable {
    /// Empty table; use [`RouteTable::standard`] for the built-in operations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes for every built-in settings/theme/backup/preview operation.
    #[must_use]
    pub fn standard() -> Self {
        use Method::*;

        let mut table = Self::new();
        table.register(ops::GET_SETTINGS, RestRoute::read(Get, "/settings", "las_get_settings", "settings"));
        table.register(
            ops::SAVE_SETTINGS,
            RestRoute::write(Post, "/settings", "las_save_settings", "settings", &["settings"]),
        );
        table.register(
            ops::RESET_SETTINGS,
            RestRoute::write(Delete, "/settings", "las_reset_settings", "settings", &["settings"]),
        );
        table.register(ops::LIST_THEMES, RestRoute::read(Get, "/themes", "las_get_themes", "themes"));
        table.register(
            ops::APPLY_THEME,
            RestRoute::write(Post, "/themes/{id}/apply", "las_apply_theme", "themes/{id}", &["settings"]),
        );
        table.register(
            ops::CREATE_BACKUP,
            RestRoute::write(Post, "/backups", "las_create_backup", "backups", &["backups"]),
        );
        table.register(ops::LIST_BACKUPS, RestRoute::read(Get, "/backups", "las_list_backups", "backups"));
        table.register(
            ops::GET_BACKUP,
            RestRoute::read(Get, "/backups/{id}", "las_get_backup", "backups/{id}"),
        );
        table.register(
            ops::RESTORE_BACKUP,
            RestRoute::write(
                Post,
                "/backups/{id}/restore",
                "las_restore_backup",
                "backups/{id}",
                &["settings", "backups"],
            ),
        );
        table.register(
            ops::DELETE_BACKUP,
            RestRoute::write(Delete, "/backups/{id}", "las_delete_backup", "backups/{id}", &["backups"]),
        );
        table.register(
            ops::CLEANUP_BACKUPS,
            RestRoute::write(Post, "/backups/cleanup", "las_cleanup_backups", "backups", &["backups"]),
        );
        table.register(
            ops::GENERATE_PREVIEW,
            RestRoute::read(Post, "/preview", "las_generate_preview", "preview"),
        );
        table
    }

    pub fn register(&mut self, operation: impl Into<String>, adapter: impl OperationAdapter + 'static) {
        self.routes.insert(operation.into(), Arc::new(adapter));
    }

    #[must_use]
    pub fn get(&self, operation: &str) -> Option<Arc<dyn OperationAdapter>> {
        self.routes.get(operation).cloned()
    }

    #[must_use]
    pub fn contains(&self, operation: &str) -> bool {
        self.routes.contains_key(operation)
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ops: Vec<&str> = self.operations().collect();
        ops.sort_unstable();
        f.debug_struct("RouteTable").field("operations", &ops).finish()
    }
}
