//! Gemini client error types.

use thiserror::Error;

pub type GeminiResult<T> = Result<T, GeminiError>;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gemini API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("File {name} did not become ACTIVE after {waited_secs}s (last state: {state})")]
    FileNotReady {
        name: String,
        state: String,
        waited_secs: u64,
    },

    #[error("File {name} failed server-side processing")]
    FileFailed { name: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeminiError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn from_http_status(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Api {
            status: status.as_u16(),
            body: body.into(),
        }
    }

    /// Transient transport failures: network errors, rate limiting, server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            GeminiError::Network(e) => !e.is_builder() && !e.is_decode(),
            GeminiError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Errors caused by the environment rather than the request content.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GeminiError::Config(_) | GeminiError::FileNotReady { .. } | GeminiError::FileFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let rate_limited = GeminiError::from_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        let unavailable = GeminiError::from_http_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        let bad_request = GeminiError::from_http_status(reqwest::StatusCode::BAD_REQUEST, "bad");

        assert!(rate_limited.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!bad_request.is_retryable());
        assert_eq!(bad_request.to_string(), "Gemini API returned 400: bad");
    }

    #[test]
    fn test_file_errors_are_config_errors() {
        let err = GeminiError::FileNotReady {
            name: "files/abc".into(),
            state: "PROCESSING".into(),
            waited_secs: 60,
        };
        assert!(err.is_config_error());
        assert!(!err.is_retryable());
    }
}
