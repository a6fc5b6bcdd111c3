//! HTTP status → error kind mapping.
//!
//! | status                | kind          | retried |
//! |-----------------------|---------------|---------|
//! | 2xx                   | success       | –       |
//! | 401, 403              | Permission    | never   |
//! | 404, 410              | NotFound      | never   |
//! | 400, 409, 422         | Validation    | never   |
//! | 429                   | RateLimited   | yes     |
//! | 5xx, code storage     | Storage       | never   |
//! | 5xx, code generation  | Generation    | yes     |
//! | 408, 5xx, other       | Network       | yes     |

use serde_json::Value;

use super::TransportResponse;
use crate::error::SyncError;

/// Classify a response: body on success, structured error otherwise.
pub fn classify_response(response: TransportResponse, resource: &str) -> Result<Value, SyncError> {
    if response.is_success() {
        return Ok(response.body);
    }
    Err(error_for_status(&response, resource))
}

pub fn error_for_status(response: &TransportResponse, resource: &str) -> SyncError {
    let status = response.status;
    match status {
        401 | 403 => SyncError::Permission { status, message: message_of(&response.body) },
        404 | 410 => SyncError::not_found(resource),
        400 | 409 | 422 => SyncError::validation(problems_of(&response.body)),
        429 => SyncError::RateLimited {
            retry_after_secs: response.header("retry-after").and_then(|v| v.trim().parse().ok()),
        },
        500..=599 if code_of(&response.body) == Some("storage") => {
            SyncError::Storage(message_of(&response.body))
        }
        500..=599 if code_of(&response.body) == Some("generation") => {
            SyncError::Generation(message_of(&response.body))
        }
        _ => SyncError::Network {
            status: Some(status),
            message: format!("unexpected status {status}: {}", message_of(&response.body)),
        },
    }
}

fn code_of(body: &Value) -> Option<&str> {
    body.get("code")
        .or_else(|| body.get("data").and_then(|d| d.get("code")))
        .and_then(Value::as_str)
}

fn message_of(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("data").and_then(|d| d.get("message")))
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string()
}

/// Field-level problems from `errors` (strings or `{field, message}`
/// objects), falling back to the top-level message.
fn problems_of(body: &Value) -> Vec<String> {
    let errors = body
        .get("errors")
        .or_else(|| body.get("data").and_then(|d| d.get("errors")))
        .and_then(Value::as_array);

    let problems: Vec<String> = errors
        .into_iter()
        .flatten()
        .filter_map(|e| match e {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => {
                let message = o.get("message").and_then(Value::as_str)?;
                Some(match o.get("field").and_then(Value::as_str) {
                    Some(field) => format!("{field}: {message}"),
                    None => message.to_string(),
                })
            }
            _ => None,
        })
        .collect();

    if problems.is_empty() {
        vec![message_of(body)]
    } else {
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn classify(status: u16, body: Value) -> Result<Value, SyncError> {
        classify_response(TransportResponse::new(status, body), "settings")
    }

    #[test]
    fn test_success_returns_body() {
        assert_eq!(classify(200, json!({"ok": true})).unwrap(), json!({"ok": true}));
        assert_eq!(classify(201, json!(1)).unwrap(), json!(1));
    }

    #[test]
    fn test_terminal_statuses() {
        assert_eq!(classify(403, json!({})).unwrap_err().kind(), ErrorKind::Permission);
        assert_eq!(classify(401, json!({})).unwrap_err().kind(), ErrorKind::Permission);
        assert_eq!(classify(404, json!({})).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(classify(422, json!({})).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_retryable_statuses() {
        assert_eq!(classify(500, json!({})).unwrap_err().kind(), ErrorKind::Network);
        assert_eq!(classify(503, json!({})).unwrap_err().status(), Some(503));
        assert_eq!(classify(429, json!({})).unwrap_err().kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn test_server_error_codes() {
        let err = classify(500, json!({"code": "generation", "message": "template error"})).unwrap_err();
        assert_eq!(err, SyncError::Generation("template error".into()));
        assert!(err.is_retryable());

        let err = classify(500, json!({"data": {"code": "storage", "message": "disk full"}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.is_terminal());
    }

    #[test]
    fn test_retry_after_is_parsed() {
        let resp = TransportResponse::new(429, json!({})).with_header("Retry-After", "7");
        let err = classify_response(resp, "settings").unwrap_err();
        assert_eq!(err, SyncError::RateLimited { retry_after_secs: Some(7) });
    }

    #[test]
    fn test_validation_problems_from_body() {
        let err = classify(
            422,
            json!({"errors": [{"field": "menu_background", "message": "invalid color"}, "too long"]}),
        )
        .unwrap_err();
        assert_eq!(err.problems(), &["menu_background: invalid color".to_string(), "too long".to_string()]);
    }

    #[test]
    fn test_validation_falls_back_to_message() {
        let err = classify(400, json!({"message": "bad payload"})).unwrap_err();
        assert_eq!(err.problems(), &["bad payload".to_string()]);
    }

    #[test]
    fn test_permission_message_from_ajax_envelope() {
        let err = classify(403, json!({"success": false, "data": {"message": "nonce expired"}})).unwrap_err();
        assert_eq!(err, SyncError::Permission { status: 403, message: "nonce expired".into() });
    }
}
