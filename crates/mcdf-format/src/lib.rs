//! MCDF character archive codec.
//!
//! An MCDF archive bundles a character's mod metadata with the raw contents of
//! every file it references, so the character can be reconstituted elsewhere.
//!
//! # File Format
//!
//! The whole file is a single Zstandard stream. Decompressed, it contains:
//! - 4 bytes: Magic (`MCDF`)
//! - 1 byte: Version (1)
//! - 4 bytes: Metadata length (i32, little-endian)
//! - N bytes: Metadata (UTF-8 JSON, see [`ArchiveMetadata`])
//! - The raw bytes of every embedded file, concatenated in metadata order
//!
//! There is no per-entry framing: each entry's bytes are exactly as long as its
//! declared length, and readers must consume exactly that many.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mcdf_format::{ArchiveOptions, ArchivePlan, ArchiveReader, CharacterSnapshot, DirectoryStore};
//!
//! let store = DirectoryStore::open("cache")?;
//! let snapshot = CharacterSnapshot::default();
//! let options = ArchiveOptions::default();
//!
//! // Write
//! let plan = ArchivePlan::build(&snapshot, "my character", &store, &options)?;
//! let report = plan.save("character.mcdf", &options)?;
//! println!("skipped {} replacements", report.skipped.len());
//!
//! // Read back
//! let mut reader = ArchiveReader::open("character.mcdf", &options)?;
//! let extracted = reader.extract(Path::new("staging"), Some(&store))?;
//! for (game_path, local) in &extracted.mapping {
//!     println!("{} -> {}", game_path, local.display());
//! }
//! # Ok::<(), mcdf_format::Error>(())
//! ```

mod error;
mod reader;
mod temp;
mod writer;

pub mod compression;
pub mod header;
pub mod metadata;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
pub use header::ArchiveHeader;
pub use metadata::{ArchiveMetadata, CustomizationStrings, EmbeddedFile, FileSwap};
pub use reader::{extract_archive, read_header, ArchiveReader, ExtractedArchive, VerifyReport};
pub use snapshot::{CharacterSnapshot, FileReplacement};
pub use store::{ContentStore, DirectoryStore};
pub use temp::TempFiles;
pub use writer::{save_snapshot, ArchivePlan, SaveReport, SkippedEntry, WriteProgress};

pub use mcdf_common::{ContentHash, DEFAULT_BUFFER_SIZE};

/// Tuning for reading and writing archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Zstandard level used when writing.
    pub compression_level: i32,
    /// Size of the streaming buffer; clamped to `1..=DEFAULT_BUFFER_SIZE`.
    pub buffer_size: usize,
    /// Fail instead of skipping replacements whose content cannot be found.
    pub strict_content: bool,
}

impl ArchiveOptions {
    /// Effective buffer size.
    pub fn buffer_size(&self) -> usize {
        mcdf_common::clamp_buffer_size(self.buffer_size)
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_level: compression::DEFAULT_LEVEL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            strict_content: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_buffer_size_is_clamped() {
        let mut options = ArchiveOptions {
            buffer_size: 0,
            ..Default::default()
        };
        assert_eq!(options.buffer_size(), 1);

        options.buffer_size = usize::MAX;
        assert_eq!(options.buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_save_then_extract() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::open(dir.path().join("cache")).unwrap();

        let mut replacements = Vec::new();
        let blobs: Vec<Vec<u8>> = vec![b"model data".to_vec(), vec![0xAB; 300_000], Vec::new()];
        for (i, blob) in blobs.iter().enumerate() {
            let source = dir.path().join(format!("file{i}.bin"));
            fs::write(&source, blob).unwrap();
            let hash = store.insert(&source).unwrap();
            replacements.push(FileReplacement::content([format!("chara/{i}.bin")], hash));
        }
        replacements.push(FileReplacement::swap(["chara/swapped.tex"], "chara/original.tex"));

        let snapshot = CharacterSnapshot {
            customization: CustomizationStrings {
                glamour: "glamour".to_string(),
                body_shape: "shape".to_string(),
            },
            manipulation: "manipulation".to_string(),
            file_replacements: replacements,
        };

        let options = ArchiveOptions::default();
        let archive = dir.path().join("character.mcdf");
        let report = save_snapshot(&snapshot, "round trip", &store, &archive, &options).unwrap();

        assert_eq!(report.embedded, 3);
        assert_eq!(report.swaps, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.body_bytes, 10 + 300_000);
        assert!(report.archive_bytes < report.body_bytes);

        let header = read_header(&archive).unwrap();
        assert_eq!(header.metadata().description, "round trip");
        assert_eq!(header.metadata().customization, snapshot.customization);

        // Extract without the store so every entry lands in a temporary file
        let staging = dir.path().join("staging");
        let (parsed, extracted) = extract_archive(&archive, &staging, None, &options).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(extracted.temp_files.len(), 3);

        for (i, blob) in blobs.iter().enumerate() {
            let local = &extracted.mapping[&format!("chara/{i}.bin")];
            assert_eq!(&fs::read(local).unwrap(), blob);
        }
        assert_eq!(
            extracted.mapping["chara/swapped.tex"],
            std::path::PathBuf::from("chara/original.tex")
        );

        drop(extracted);
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }
}
