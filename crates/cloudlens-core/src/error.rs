//! Error types for cloudlens.

use thiserror::Error;

/// The main error type for cloudlens operations.
#[derive(Error, Debug)]
pub enum CloudlensError {
    /// A covariance matrix that is not a finite, symmetric 3x3 matrix.
    #[error("invalid covariance: {0}")]
    InvalidCovariance(String),

    /// Parallel per-point sequences disagree in length.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A colormap name outside the recognized set.
    #[error("unknown color map '{0}'")]
    UnknownColorMap(String),

    /// A property name outside the recognized set.
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    /// The data provider could not deliver a response.
    #[error("fetch failed: {0}")]
    FetchFailure(String),

    /// A response that parsed but violates the dataset schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for cloudlens operations.
pub type Result<T> = std::result::Result<T, CloudlensError>;
