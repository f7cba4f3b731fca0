//! Error types for hetstat

use thiserror::Error;

/// hetstat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input (shapes, domains, empty groups)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical failure (singular systems, all splits failed)
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
