//! Error types for the outbound gateway

use thiserror::Error;

/// Result type for candle fetches
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for notification and queue operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Candle source errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Requested fewer than one candle
    #[error("Invalid candle limit: {0}")]
    InvalidLimit(usize),

    /// Endpoint URL cannot be used
    #[error("Invalid market data endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport failure or non-success status
    #[error("Market data endpoint unreachable: {0}")]
    Unreachable(String),

    /// Per-call timeout elapsed
    #[error("Market data request timed out: {0}")]
    Timeout(String),

    /// Payload is not a list of candles with numeric closes
    #[error("Malformed market data response: {0}")]
    MalformedResponse(String),

    /// Fewer (or more) candles than requested
    #[error("Incomplete candle series: expected {expected}, got {actual}")]
    Incomplete {
        /// Requested number of candles
        expected: usize,
        /// Number of candles received
        actual: usize,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Unreachable(err.to_string())
        }
    }
}

/// Notification and queue errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Notification sink rejected or never received the message
    #[error("Notification failed{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    NotifyFailed {
        /// HTTP status, when a response arrived
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Broker connection, channel or confirmation failure
    #[error("Publish to {queue} failed: {message}")]
    PublishFailed {
        /// Destination queue
        queue: String,
        /// Error message
        message: String,
    },

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
