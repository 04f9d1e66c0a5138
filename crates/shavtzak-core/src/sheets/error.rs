//! Errors from the Sheets API.
//!
//! Google answers failures with `{"error": {"code", "message", "status"}}`.
//! The canonical `status` string is preferred over the HTTP code when present.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("No permission on the spreadsheet: {0}")]
    PermissionDenied(String),

    #[error("Not signed in to Google - the access token is missing or expired")]
    Unauthenticated,

    #[error("Spreadsheet or sheet not found: {0}")]
    NotFound(String),

    #[error("Invalid range or values: {0}")]
    InvalidArgument(String),

    /// Quota or per-minute request limit hit. Not retried.
    #[error("Sheets quota exceeded - try again later")]
    RateLimited,

    #[error("Sheets service error ({status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("Writing requires an access token (SHEETS_ACCESS_TOKEN)")]
    ReadOnly,
}

/// Maximum length of a raw body quoted in an error
const MAX_ERROR_BODY_LENGTH: usize = 300;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}

impl SheetsError {
    /// Classify a failed response from its HTTP status and body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let (message, canonical) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.message, envelope.error.status),
            Err(_) => (truncate_body(body.trim()), String::new()),
        };

        match canonical.as_str() {
            "PERMISSION_DENIED" => return SheetsError::PermissionDenied(message),
            "UNAUTHENTICATED" => return SheetsError::Unauthenticated,
            "NOT_FOUND" => return SheetsError::NotFound(message),
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => {
                return SheetsError::InvalidArgument(message)
            }
            "RESOURCE_EXHAUSTED" => return SheetsError::RateLimited,
            _ => {}
        }

        let code = status.as_u16();
        match code {
            400 => SheetsError::InvalidArgument(message),
            401 => SheetsError::Unauthenticated,
            403 => SheetsError::PermissionDenied(message),
            404 => SheetsError::NotFound(message),
            429 => SheetsError::RateLimited,
            500..=599 => SheetsError::Unavailable { status: code, message },
            _ => SheetsError::Unexpected { status: code, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_error_envelope() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#;
        match SheetsError::from_response(StatusCode::FORBIDDEN, body) {
            SheetsError::PermissionDenied(msg) => {
                assert_eq!(msg, "The caller does not have permission")
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let body = r#"{"error": {"code": 400, "message": "Unable to parse range: 'X'!A:A", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            SheetsError::from_response(StatusCode::BAD_REQUEST, body),
            SheetsError::InvalidArgument(ref m) if m.starts_with("Unable to parse range")
        ));
    }

    #[test]
    fn test_quota_exhausted_is_rate_limited() {
        // Sheets reports per-user quota as 429 and some quotas as 403 RESOURCE_EXHAUSTED
        let body = r#"{"error": {"code": 403, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            SheetsError::from_response(StatusCode::FORBIDDEN, body),
            SheetsError::RateLimited
        ));
        assert!(matches!(
            SheetsError::from_response(StatusCode::TOO_MANY_REQUESTS, ""),
            SheetsError::RateLimited
        ));
    }

    #[test]
    fn test_plain_body_falls_back_to_status() {
        assert!(matches!(
            SheetsError::from_response(StatusCode::UNAUTHORIZED, "nope"),
            SheetsError::Unauthenticated
        ));
        assert!(matches!(
            SheetsError::from_response(StatusCode::BAD_GATEWAY, " oops "),
            SheetsError::Unavailable { status: 502, ref message } if message == "oops"
        ));
        assert!(matches!(
            SheetsError::from_response(StatusCode::IM_A_TEAPOT, ""),
            SheetsError::Unexpected { status: 418, .. }
        ));
    }

    #[test]
    fn test_long_body_truncated_on_char_boundary() {
        let body = "ש".repeat(400); // 800 bytes
        match SheetsError::from_response(StatusCode::NOT_FOUND, &body) {
            SheetsError::NotFound(msg) => {
                assert!(msg.ends_with("... (800 bytes)"));
                assert!(msg.len() < 320);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
