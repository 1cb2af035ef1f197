// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response was classified as an anti-scraping block
    #[error("Blocked on {url} (status {status:?}): {reason}")]
    Blocked {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Timeout or connection failure
    #[error("Network failure for {url}: {message}")]
    Network { url: String, message: String },

    /// Non-blocking error status that retrying will not fix
    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    /// A required field (title) could not be resolved
    #[error("Extraction incomplete for {url}: no title resolved")]
    ExtractionIncomplete { url: String },

    /// Output sink rejected a record
    #[error("Sink error: {0}")]
    Sink(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a blocked-response error.
    pub fn blocked(url: impl Into<String>, status: Option<u16>, reason: impl fmt::Display) -> Self {
        Self::Blocked {
            url: url.into(),
            status,
            reason: reason.to_string(),
        }
    }

    /// Create a network failure error.
    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Only blocking and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. } | Self::Network { .. } | Self::Http(_)
        )
    }

    /// Whether this failure should retire the session that produced it.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_taxonomy() {
        assert!(AppError::blocked("u", Some(403), "status").is_retryable());
        assert!(AppError::network("u", "timed out").is_retryable());
        assert!(
            !AppError::ExtractionIncomplete {
                url: "u".to_string()
            }
            .is_retryable()
        );
        assert!(!AppError::config("no seeds").is_retryable());
        assert!(
            !AppError::Status {
                url: "u".to_string(),
                status: 404
            }
            .is_retryable()
        );
    }

    #[test]
    fn only_blocks_retire_sessions() {
        assert!(AppError::blocked("u", None, "captcha").is_blocking());
        assert!(!AppError::network("u", "reset").is_blocking());
    }
}
