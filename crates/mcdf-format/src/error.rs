//! Error types for MCDF archives.

use std::path::PathBuf;

use mcdf_common::ContentHash;
use thiserror::Error;

/// Errors that can occur when reading or writing MCDF archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] mcdf_common::Error),

    /// The decompressed stream does not start with the archive magic.
    #[error("invalid MCDF magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: Vec<u8> },

    /// The archive uses the letter-swapped magic of the older format generation.
    #[error("legacy MCDF format generation is not supported")]
    LegacyFormat,

    /// Recognized magic with a version byte this codec does not understand.
    #[error("unsupported MCDF version: {0}")]
    UnsupportedVersion(u8),

    /// The metadata length field is negative.
    #[error("invalid metadata length: {0}")]
    InvalidMetadataLength(i32),

    /// The metadata blob is not valid archive metadata.
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(#[source] serde_json::Error),

    /// Encoded metadata does not fit the 32-bit length field.
    #[error("metadata too large: {0} bytes")]
    MetadataTooLarge(usize),

    /// Fewer bytes were available than the archive declares.
    #[error("truncated archive: {what} needs {expected} bytes, only {actual} available")]
    Truncated {
        what: String,
        expected: u64,
        actual: u64,
    },

    /// The stream could not be decompressed.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// The stream could not be compressed.
    #[error("compression error: {0}")]
    Compression(String),

    /// A referenced hash has no local file (strict mode only).
    #[error("no local file for {hash} ({} game paths)", .game_paths.len())]
    UnresolvedContent {
        hash: ContentHash,
        game_paths: Vec<String>,
    },

    /// A source file changed size between planning and streaming.
    #[error("{} changed while writing: expected {expected} bytes, read {actual}", .path.display())]
    SourceChanged {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl Error {
    /// Whether this error means the archive itself is malformed, as opposed to
    /// an environmental failure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. }
                | Self::LegacyFormat
                | Self::UnsupportedVersion(_)
                | Self::InvalidMetadataLength(_)
                | Self::CorruptMetadata(_)
                | Self::Truncated { .. }
                | Self::Decompression(_)
        )
    }
}

/// Result type for MCDF operations.
pub type Result<T> = std::result::Result<T, Error>;
