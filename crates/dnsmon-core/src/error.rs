//! Error types for the DNS monitor
//!
//! Only configuration errors are fatal. Every other variant is caught by the
//! monitor at the point of detection and turned into a scheduling decision.

use thiserror::Error;

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS monitor
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing field, unsynthesizable URL or name)
    #[error("Configuration error: {0}")]
    Config(String),

    /// DNS resolver errors (network failure, malformed response)
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// HTTP client construction or transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Update acknowledgment did not validate
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation was abandoned because shutdown was requested
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O errors (config file, log sink)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error is fatal for monitoring
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
