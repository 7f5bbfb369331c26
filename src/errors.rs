//! Error types for kp-anonymity.

use thiserror::Error;

/// Top-level error type for anonymization runs.
#[derive(Debug, Error)]
pub enum KpError {
    /// Parameter validation failed before any clustering started.
    #[error("invalid parameters: {0}")]
    Params(String),

    /// Dataset loading or column extraction failed.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// I/O error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serde serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for anonymization operations.
pub type Result<T> = std::result::Result<T, KpError>;
