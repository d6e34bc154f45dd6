//! Error handling for medgate
//!
//! Provides a unified error type and result type for use across all medgate
//! components.

/// Result type alias for medgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for medgate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Invalid request or parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Upstream backend returned a failure or was unreachable
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Resource temporarily unavailable
    #[error("Resource unavailable: {0}")]
    Unavailable(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Upstream(_) | Error::Unavailable(_) | Error::Timeout(_) | Error::Internal(_)
        )
    }

    /// Check if this error indicates a client-side problem
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_) | Error::InvalidRequest(_) | Error::NotFound(_)
        )
    }

    /// Get the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::InvalidRequest(_) => "invalid_request",
            Error::NotFound(_) => "not_found",
            Error::Upstream(_) => "upstream",
            Error::Unavailable(_) => "unavailable",
            Error::Timeout(_) => "timeout",
            Error::Store(_) => "store",
            Error::Internal(_) => "internal",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }

    /// Convert to HTTP status code (useful for REST APIs)
    pub fn to_http_status(&self) -> u16 {
        match self {
            Error::InvalidConfiguration(_) | Error::InvalidRequest(_) => 400,
            Error::NotFound(_) => 404,
            Error::Timeout(_) => 408,
            Error::Upstream(_) => 502,
            Error::Unavailable(_) => 503,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("invalid setting");
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(err.to_string(), "Configuration error: invalid setting");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::config("test").category(), "configuration");
        assert_eq!(Error::upstream("test").category(), "upstream");
        assert_eq!(Error::not_found("test").category(), "not_found");
    }

    #[test]
    fn test_error_classification() {
        let client_err = Error::invalid_request("bad params");
        assert!(client_err.is_client_error());
        assert!(!client_err.is_retryable());

        let server_err = Error::upstream("backend down");
        assert!(!server_err.is_client_error());
        assert!(server_err.is_retryable());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(Error::invalid_request("test").to_http_status(), 400);
        assert_eq!(Error::not_found("test").to_http_status(), 404);
        assert_eq!(Error::upstream("test").to_http_status(), 502);
        assert_eq!(Error::internal("test").to_http_status(), 500);
    }
}
