use std::time::Duration;
use thiserror::Error;

/// Error categorization for the aggregation pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // I/O errors (potentially transient)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors (usually permanent)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Network errors (transient - should retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network timeout after {timeout:?}: {message}")]
    NetworkTimeout { timeout: Duration, message: String },

    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    // Client errors (permanent - don't retry)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // Server errors (transient - should retry)
    #[error("Service temporarily unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // Storage errors
    #[error("Storage error: {operation} failed - {reason}")]
    Storage { operation: String, reason: String },

    // Parse errors
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    // Session lifecycle errors
    #[error("Session error: {0}")]
    Session(String),

    // Enrichment collaborator errors
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    // Source adapter errors
    #[error("Source error: {0}")]
    Source(String),
}

/// Error categorization for retry strategies
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry with backoff
    RateLimited,
}

impl Error {
    /// Categorize error for retry logic
    pub fn category(&self) -> ErrorCategory {
        match self {
            // Permanent errors - don't retry
            Error::Config(_)
            | Error::InvalidInput { .. }
            | Error::Parse { .. }
            | Error::Session(_)
            | Error::Serde(_) => ErrorCategory::Permanent,

            // Rate limited - retry with backoff
            Error::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            // Transient errors - retry with exponential backoff
            Error::Http(_)
            | Error::NetworkTimeout { .. }
            | Error::ServiceUnavailable { .. }
            | Error::Timeout { .. }
            | Error::Storage { .. }
            | Error::Enrichment(_)
            | Error::Source(_)
            | Error::Io(_) => ErrorCategory::Transient,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Get suggested retry delay for rate limited errors
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// Source adapter error conversion
impl From<crate::client::providers::SourceError> for Error {
    fn from(err: crate::client::providers::SourceError) -> Self {
        use crate::client::providers::SourceError;
        match err {
            SourceError::Network(msg) => Error::Source(format!("Network error: {msg}")),
            SourceError::Parse(msg) => Error::Parse {
                context: "source".to_string(),
                message: msg,
            },
            SourceError::RateLimit => Error::RateLimitExceeded {
                retry_after: Duration::from_secs(60),
            },
            SourceError::Auth(msg) => Error::Source(format!("Authentication failed: {msg}")),
            SourceError::InvalidQuery(msg) => Error::InvalidInput {
                field: "query".to_string(),
                reason: msg,
            },
            SourceError::ServiceUnavailable(msg) => Error::ServiceUnavailable {
                service: "source".to_string(),
                reason: msg,
            },
            SourceError::Timeout => Error::Timeout {
                timeout: Duration::from_secs(30),
            },
            SourceError::Other(msg) => Error::Source(msg),
        }
    }
}
