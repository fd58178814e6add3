//! Error types for applying archives.

use thiserror::Error;

/// Boxed error returned by mod-application collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while saving, loading or applying archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Another save, load or apply cycle is running.
    #[error("another archive operation is already in progress")]
    Busy,

    /// The apply was cancelled before customization was applied.
    #[error("apply was cancelled")]
    Cancelled,

    /// Archive format or extraction error.
    #[error("{0}")]
    Archive(#[from] mcdf_format::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The mod-application collaborator failed.
    #[error("{step} failed: {source}")]
    Collaborator {
        step: &'static str,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Whether the caller may simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }

    pub(crate) fn collaborator(step: &'static str) -> impl FnOnce(BoxError) -> Self {
        move |source| Self::Collaborator { step, source }
    }
}

/// Result type for apply operations.
pub type Result<T> = std::result::Result<T, Error>;
