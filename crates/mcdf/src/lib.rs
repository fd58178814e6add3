//! MCDF - character data archive library.
//!
//! This crate provides a unified interface to the MCDF crates.
//!
//! # Crates
//!
//! - [`mcdf_common`] - Common utilities (content hashes, bounded stream copies)
//! - [`mcdf_format`] - Archive codec (header framing, Zstd transport, writer, extractor)
//! - [`mcdf_apply`] - Apply pipeline (staging, busy state, guaranteed cleanup)
//!
//! # Example
//!
//! ```no_run
//! use mcdf::prelude::*;
//!
//! let store = DirectoryStore::open("cache")?;
//! let header = mcdf::format::read_header("character.mcdf")?;
//! println!("{}: {} files", header.metadata().description, header.metadata().files.len());
//!
//! let options = ArchiveOptions::default();
//! let mut reader = ArchiveReader::open("character.mcdf", &options)?;
//! let extracted = reader.extract(std::path::Path::new("out"), Some(&store))?;
//! println!("{} game paths", extracted.mapping.len());
//! # Ok::<(), mcdf::format::Error>(())
//! ```

// Re-export all sub-crates
pub use mcdf_apply as apply;
pub use mcdf_common as common;
pub use mcdf_format as format;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use mcdf_apply::{
        ApplyReport, ArchiveManager, CancellationToken, LoadedArchive, ManagerConfig, ModApplier,
        TargetId,
    };
    pub use mcdf_common::ContentHash;
    pub use mcdf_format::{
        ArchiveHeader, ArchiveMetadata, ArchiveOptions, ArchivePlan, ArchiveReader,
        CharacterSnapshot, ContentStore, DirectoryStore, FileReplacement, SaveReport,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
