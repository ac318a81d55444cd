use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while scanning a drive or writing a report
#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Not found: {id}")]
    NotFound { id: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited by remote service: {message}")]
    RateLimited { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid remote structure: {message}")]
    InvalidStructure { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FinderError {
    /// Whether retrying the same request might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FinderError::Network(_) | FinderError::RateLimited { .. } => true,
            FinderError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map a non-success HTTP response to an error
    ///
    /// `id` names the resource that was requested, for `NotFound`.
    pub(crate) fn from_status(status: StatusCode, body: &str, id: &str) -> Self {
        let message = parse_google_api_error(body);
        match status {
            StatusCode::NOT_FOUND => FinderError::NotFound { id: id.to_string() },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                if !message.contains("rateLimitExceeded")
                    && !message.contains("userRateLimitExceeded") =>
            {
                FinderError::Unauthorized { message }
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                FinderError::RateLimited { message }
            }
            status => FinderError::Upstream {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    code: Option<u16>,
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    errors: Vec<GoogleErrorReason>,
}

#[derive(Deserialize)]
struct GoogleErrorReason {
    reason: Option<String>,
}

/// Extract a readable message from a Google API error body
///
/// Falls back to the raw body when it is not a Google error document.
pub fn parse_google_api_error(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<GoogleErrorBody>(body) else {
        return body.to_string();
    };
    let detail = parsed.error;

    let mut parts = Vec::new();
    if let Some(code) = detail.code {
        parts.push(format!("Code: {}", code));
    }
    if let Some(status) = detail.status {
        parts.push(format!("Status: {}", status));
    }
    if let Some(message) = detail.message {
        parts.push(format!("Message: {}", message));
    }
    let reasons: Vec<String> = detail.errors.into_iter().filter_map(|e| e.reason).collect();
    if !reasons.is_empty() {
        parts.push(format!("Reason: {}", reasons.join(", ")));
    }

    if parts.is_empty() {
        body.to_string()
    } else {
        parts.join(" | ")
    }
}

/// Result type alias for finder operations
pub type Result<T> = std::result::Result<T, FinderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_google_api_error() {
        let body = r#"{"error":{"code":404,"status":"NOT_FOUND","message":"File not found: abc"}}"#;
        assert_eq!(
            parse_google_api_error(body),
            "Code: 404 | Status: NOT_FOUND | Message: File not found: abc"
        );
        assert_eq!(parse_google_api_error("plain text"), "plain text");
    }

    #[test]
    fn test_status_classification() {
        let rate = r#"{"error":{"code":403,"message":"slow down","errors":[{"reason":"userRateLimitExceeded"}]}}"#;
        assert!(matches!(
            FinderError::from_status(StatusCode::FORBIDDEN, rate, "x"),
            FinderError::RateLimited { .. }
        ));
        assert!(matches!(
            FinderError::from_status(StatusCode::FORBIDDEN, "denied", "x"),
            FinderError::Unauthorized { .. }
        ));
        assert!(matches!(
            FinderError::from_status(StatusCode::NOT_FOUND, "", "x"),
            FinderError::NotFound { .. }
        ));

        let upstream = FinderError::from_status(StatusCode::BAD_GATEWAY, "", "x");
        assert!(upstream.is_retryable());
        assert!(!FinderError::from_status(StatusCode::UNAUTHORIZED, "", "x").is_retryable());
        assert!(FinderError::from_status(StatusCode::TOO_MANY_REQUESTS, "", "x").is_retryable());
    }
}
