use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("DigitalOcean API request failed (status {status}): {message}")]
    Status { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

/// Error document returned by the DigitalOcean API, e.g.
/// `{"id": "unauthorized", "message": "Unable to authenticate you"}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    /// Classify a non-success response by status, keeping the server's message
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body);

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            _ => ApiError::Status { status, message },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// HTTP status of the failed call, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(err) => err.status(),
            ApiError::Decode(_) => None,
        }
    }
}

/// Pull a readable message out of an error body.
///
/// Prefers the `message` field of the JSON error document, falls back to the
/// `id` field, then to the (truncated) raw body.
fn extract_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
        if let Some(id) = parsed.id.filter(|id| !id.is_empty()) {
            return id;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }

    if trimmed.len() > 200 {
        let mut end = 200;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_classified() {
        let err = ApiError::from_response(
            StatusCode::UNAUTHORIZED,
            r#"{"id":"unauthorized","message":"Unable to authenticate you"}"#,
        );
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Unauthorized: Unable to authenticate you");
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_not_found_is_classified() {
        let err = ApiError::from_response(
            StatusCode::NOT_FOUND,
            r#"{"id":"not_found","message":"The resource you requested could not be found."}"#,
        );
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_other_status_keeps_message_verbatim() {
        let err = ApiError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"id":"unprocessable_entity","message":"expiry_seconds is out of range"}"#,
        );
        match &err {
            ApiError::Status { status, message } => {
                assert_eq!(*status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(message, "expiry_seconds is out of range");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_message_falls_back_to_id() {
        let err = ApiError::from_response(StatusCode::FORBIDDEN, r#"{"id":"forbidden"}"#);
        assert_eq!(
            err.to_string(),
            "DigitalOcean API request failed (status 403 Forbidden): forbidden"
        );
    }

    #[test]
    fn test_message_falls_back_to_raw_body() {
        assert_eq!(extract_message("upstream timeout"), "upstream timeout");
        assert_eq!(extract_message("   "), "no response body");

        let long = "x".repeat(300);
        let message = extract_message(&long);
        assert_eq!(message.len(), 203);
        assert!(message.ends_with("..."));
    }
}
