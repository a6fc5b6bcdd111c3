//! Request parsing for both wire shapes.
//!
//! REST requests are matched on method and path segments; admin-ajax
//! requests carry `{action, payload}` in the body. Both resolve to the
//! same [`Call`], so the handlers never see which shape was used.

use serde_json::Value;

use crate::error::SyncError;
use crate::transport::{Method, TransportRequest};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    GetSettings,
    SaveSettings(Value),
    ResetSettings,
    ListThemes,
    ApplyTheme(String),
    CreateBackup { note: Option<String> },
    ListBackups,
    GetBackup(String),
    RestoreBackup(String),
    DeleteBackup(String),
    CleanupBackups,
    GeneratePreview(Value),
}

impl Call {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::GetSettings => "get_settings",
            Self::SaveSettings(_) => "save_settings",
            Self::ResetSettings => "reset_settings",
            Self::ListThemes => "list_themes",
            Self::ApplyTheme(_) => "apply_theme",
            Self::CreateBackup { .. } => "create_backup",
            Self::ListBackups => "list_backups",
            Self::GetBackup(_) => "get_backup",
            Self::RestoreBackup(_) => "restore_backup",
            Self::DeleteBackup(_) => "delete_backup",
            Self::CleanupBackups => "cleanup_backups",
            Self::GeneratePreview(_) => "generate_preview",
        }
    }
}

fn body_of(request: &TransportRequest) -> Value {
    request.body.clone().unwrap_or(Value::Null)
}

fn note_of(payload: &Value) -> Option<String> {
    payload.get("note").and_then(Value::as_str).map(String::from)
}

/// `None` when no REST route matches.
pub(crate) fn parse_rest(request: &TransportRequest) -> Option<Call> {
    let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
    let call = match (request.method, segments.as_slice()) {
        (Method::Get, ["settings"]) => Call::GetSettings,
        (Method::Post | Method::Put, ["settings"]) => Call::SaveSettings(body_of(request)),
        (Method::Delete, ["settings"]) => Call::ResetSettings,
        (Method::Get, ["themes"]) => Call::ListThemes,
        (Method::Post, ["themes", id, "apply"]) => Call::ApplyTheme((*id).to_string()),
        (Method::Get, ["backups"]) => Call::ListBackups,
        (Method::Post, ["backups"]) => Call::CreateBackup { note: note_of(&body_of(request)) },
        (Method::Post, ["backups", "cleanup"]) => Call::CleanupBackups,
        (Method::Get, ["backups", id]) => Call::GetBackup((*id).to_string()),
        (Method::Delete, ["backups", id]) => Call::DeleteBackup((*id).to_string()),
        (Method::Post, ["backups", id, "restore"]) => Call::RestoreBackup((*id).to_string()),
        (Method::Post, ["preview"]) => Call::GeneratePreview(body_of(request)),
        _ => return None,
    };
    Some(call)
}

/// Parse an admin-ajax body. Unknown actions are invalid requests.
pub(crate) fn parse_ajax(request: &TransportRequest) -> Result<Call, SyncError> {
    let body = body_of(request);
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::InvalidRequest("ajax request has no action".into()))?;
    let payload = body.get("payload").cloned().unwrap_or(Value::Null);

    let id = || {
        payload
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| SyncError::InvalidRequest(format!("{action}: payload has no id")))
    };

    Ok(match action {
        "las_get_settings" => Call::GetSettings,
        "las_save_settings" => Call::SaveSettings(payload.clone()),
        "las_reset_settings" => Call::ResetSettings,
        "las_get_themes" => Call::ListThemes,
        "las_apply_theme" => Call::ApplyTheme(id()?),
        "las_create_backup" => Call::CreateBackup { note: note_of(&payload) },
        "las_list_backups" => Call::ListBackups,
        "las_get_backup" => Call::GetBackup(id()?),
        "las_restore_backup" => Call::RestoreBackup(id()?),
        "las_delete_backup" => Call::DeleteBackup(id()?),
        "las_cleanup_backups" => Call::CleanupBackups,
        "las_generate_preview" => Call::GeneratePreview(payload.clone()),
        other => return Err(SyncError::InvalidRequest(format!("unknown ajax action '{other}'"))),
    })
}
