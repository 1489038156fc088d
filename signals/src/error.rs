//! Error types for signal evaluation

use sg_gateway::FetchError;
use sg_storage::StorageError;
use thiserror::Error;

/// Main error type for signal operations
#[derive(Error, Debug)]
pub enum SignalError {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Insufficient data for calculation
    #[error("Insufficient data: need {needed} points, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Candle source failure
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Position store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SignalError {
    /// Unit is skipped for this tick rather than failed
    pub fn is_skip(&self) -> bool {
        matches!(self, SignalError::Fetch(_) | SignalError::InsufficientData { .. })
    }
}

/// Result type for signal operations
pub type SignalResult<T> = Result<T, SignalError>;
