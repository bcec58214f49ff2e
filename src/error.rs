use reqwest::StatusCode;
use serde_json::Value as JsonValue;

use crate::services::question_service::QuestionError;
use crate::services::wizard_service::FieldErrors;

pub type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_LOCKOUT_SECS: u64 = 300;
/// Longest lockout honoured from a server response.
pub const MAX_LOCKOUT_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Account temporarily locked for {lockout_secs}s")]
    Locked { lockout_secs: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{notice}")]
    Form { notice: String, fields: FieldErrors },

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl Error {
    /// Maps a non-success response onto the portal's error categories.
    ///
    /// The message is taken from the body's `error`, `message` or `detail`
    /// field, falling back to `fallback`.
    pub fn from_response(status: StatusCode, body: &JsonValue, fallback: &str) -> Self {
        let message = ["error", "message", "detail"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string());

        match status {
            StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
            StatusCode::TOO_MANY_REQUESTS => Error::Locked {
                lockout_secs: body
                    .get("lockout_time")
                    .and_then(lockout_seconds)
                    .unwrap_or(DEFAULT_LOCKOUT_SECS)
                    .min(MAX_LOCKOUT_SECS),
            },
            StatusCode::NOT_FOUND => Error::NotFound(message),
            other => Error::Api {
                status: other.as_u16(),
                message,
            },
        }
    }

    /// True when the caller should drop the session and go back to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// Short message suitable for a transient notification.
    pub fn notice(&self) -> String {
        match self {
            Error::Unauthorized(_) => "Session expired. Please login again.".to_string(),
            Error::Locked { lockout_secs } => format!(
                "Account temporarily locked. Try again in {}",
                crate::utils::time::format_lockout(*lockout_secs)
            ),
            Error::Api { message, .. } | Error::NotFound(message) | Error::BadRequest(message) => {
                message.clone()
            }
            Error::Form { notice, .. } => notice.clone(),
            Error::Question(err) => err.to_string(),
            Error::Validation(err) => crate::utils::validation::first_message(err)
                .unwrap_or_else(|| err.to_string()),
            Error::Reqwest(_) => "Network error. Please try again later.".to_string(),
            _ => "An unexpected error occurred".to_string(),
        }
    }
}

/// Whole seconds, rounded up; numbers may arrive as strings or fractions.
fn lockout_seconds(value: &JsonValue) -> Option<u64> {
    if let Some(secs) = value.as_u64() {
        return Some(secs);
    }
    let secs = match value {
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        other => other.as_f64()?,
    };
    (secs.is_finite() && secs >= 0.0).then(|| secs.ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lockout_duration_is_parsed_with_default() {
        let err = Error::from_response(
            StatusCode::TOO_MANY_REQUESTS,
            &json!({ "lockout_time": 120 }),
            "Login failed",
        );
        assert!(matches!(err, Error::Locked { lockout_secs: 120 }));

        let err = Error::from_response(StatusCode::TOO_MANY_REQUESTS, &json!({}), "Login failed");
        assert!(matches!(err, Error::Locked { lockout_secs: DEFAULT_LOCKOUT_SECS }));
    }

    #[test]
    fn fractional_and_huge_lockouts_are_bounded() {
        let locked = |body: JsonValue| match Error::from_response(StatusCode::TOO_MANY_REQUESTS, &body, "Login failed") {
            Error::Locked { lockout_secs } => lockout_secs,
            other => panic!("unexpected error {:?}", other),
        };
        assert_eq!(locked(json!({ "lockout_time": 299.5 })), 300);
        assert_eq!(locked(json!({ "lockout_time": "59.2" })), 60);
        assert_eq!(locked(json!({ "lockout_time": u64::MAX })), MAX_LOCKOUT_SECS);
        assert_eq!(locked(json!({ "lockout_time": -5 })), DEFAULT_LOCKOUT_SECS);
    }

    #[test]
    fn message_prefers_body_over_fallback() {
        let err = Error::from_response(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "Invalid email format" }),
            "Error sending verification code",
        );
        assert_eq!(err.notice(), "Invalid email format");

        let err = Error::from_response(StatusCode::INTERNAL_SERVER_ERROR, &json!(null), "Failed to update test.");
        assert_eq!(err.notice(), "Failed to update test.");
        assert!(!err.requires_login());
    }

    #[test]
    fn unauthorized_requires_login() {
        let err = Error::from_response(StatusCode::UNAUTHORIZED, &json!({}), "x");
        assert!(err.requires_login());
        assert_eq!(err.notice(), "Session expired. Please login again.");
    }
}
