//! Error types for mcdf-common.

use thiserror::Error;

/// Common error type for MCDF operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid content hash string.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
