//! Error model used by Redmine API client operations.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedmineError>;

/// Represents the failures a Redmine request can surface: non-success HTTP answers, rejected API keys, timeouts, connection problems, undecodable payloads and anything else unexpected.
#[derive(Debug, Error)]
pub enum RedmineError {
    #[error("http {status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl RedmineError {
    /// Constructs an HTTP error variant.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        RedmineError::Http {
            status,
            message: message.into(),
        }
    }

    /// Returns true when the server rejected the configured API key.
    pub fn is_authentication(&self) -> bool {
        matches!(self, RedmineError::Authentication(_))
    }
}

impl From<reqwest::Error> for RedmineError {
    /// Converts reqwest errors into semantic RedmineError variants.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RedmineError::Timeout(err.to_string())
        } else if err.is_status() {
            let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            RedmineError::Http {
                status,
                message: err.to_string(),
            }
        } else if err.is_connect() {
            RedmineError::Network(err.to_string())
        } else if err.is_decode() {
            RedmineError::Serialization(err.to_string())
        } else {
            RedmineError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RedmineError {
    /// Converts serde_json decode/encode failures into serialization errors.
    fn from(err: serde_json::Error) -> Self {
        RedmineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::RedmineError;
    use reqwest::StatusCode;

    #[test]
    fn http_error_display_includes_status_and_message() {
        let err = RedmineError::http(StatusCode::NOT_FOUND, "issue not found");
        assert_eq!(err.to_string(), "http 404 Not Found: issue not found");
    }

    #[test]
    fn serde_errors_become_serialization_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RedmineError::from(parse);
        assert!(matches!(err, RedmineError::Serialization(_)));
        assert!(!err.is_authentication());
    }
}
