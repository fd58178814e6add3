//! Archive writer.
//!
//! Writing happens in two steps. [`ArchivePlan::build`] turns a character
//! snapshot into metadata, resolving every content hash to a local file and
//! recording the ones that cannot be resolved. [`ArchivePlan::save`] then
//! streams the header and every resolved file through one compression stream.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use mcdf_common::stream::copy_exact;
use mcdf_common::ContentHash;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::compression::CompressedWriter;
use crate::header::ArchiveHeader;
use crate::metadata::{ArchiveMetadata, EmbeddedFile, FileSwap};
use crate::snapshot::CharacterSnapshot;
use crate::store::ContentStore;
use crate::{ArchiveOptions, Error, Result};

/// A file replacement that could not be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Game paths that will be missing from the archive.
    pub game_paths: BTreeSet<String>,
    /// The hash that could not be resolved, if one was given.
    pub hash: Option<ContentHash>,
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Number of embedded file entries.
    pub embedded: usize,
    /// Number of file swap entries.
    pub swaps: usize,
    /// Replacements left out because their content was not found.
    pub skipped: Vec<SkippedEntry>,
    /// Uncompressed body length.
    pub body_bytes: u64,
    /// Size of the archive file on disk.
    pub archive_bytes: u64,
}

/// Progress of a write, reported once per embedded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProgress {
    /// Embedded files written so far.
    pub files_done: usize,
    /// Total embedded files.
    pub files_total: usize,
    /// Body bytes written so far.
    pub bytes_done: u64,
}

/// Metadata plus the local file backing each embedded entry.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    metadata: ArchiveMetadata,
    sources: Vec<PathBuf>,
    skipped: Vec<SkippedEntry>,
}

impl ArchivePlan {
    /// Build a plan from a live snapshot.
    ///
    /// Replacements with a non-empty swap target become file swaps. All others
    /// are resolved through `store`; replacements sharing a hash are embedded
    /// once with their game paths merged. Unresolvable replacements are
    /// skipped and reported, or rejected when `options.strict_content` is set.
    pub fn build(
        snapshot: &CharacterSnapshot,
        description: &str,
        store: &dyn ContentStore,
        options: &ArchiveOptions,
    ) -> Result<Self> {
        let mut files: Vec<EmbeddedFile> = Vec::new();
        let mut sources = Vec::new();
        let mut by_hash: HashMap<ContentHash, usize> = HashMap::new();
        let mut file_swaps = Vec::new();
        let mut skipped = Vec::new();

        for replacement in &snapshot.file_replacements {
            if let Some(target) = replacement.swap_target() {
                file_swaps.push(FileSwap {
                    game_paths: replacement.game_paths.clone(),
                    swap_target: target.to_string(),
                });
                continue;
            }

            let resolved = replacement
                .hash
                .as_ref()
                .and_then(|hash| store.resolve_path(hash).map(|path| (*hash, path)));

            let Some((hash, path)) = resolved else {
                if options.strict_content {
                    return Err(Error::UnresolvedContent {
                        hash: replacement.hash.unwrap_or_default(),
                        game_paths: replacement.game_paths.iter().cloned().collect(),
                    });
                }
                warn!(
                    hash = ?replacement.hash,
                    paths = ?replacement.game_paths,
                    "no local file for replacement, leaving it out of the archive"
                );
                skipped.push(SkippedEntry {
                    game_paths: replacement.game_paths.clone(),
                    hash: replacement.hash,
                });
                continue;
            };

            if let Some(&index) = by_hash.get(&hash) {
                files[index]
                    .game_paths
                    .extend(replacement.game_paths.iter().cloned());
                continue;
            }

            let byte_length = fs::metadata(&path)?.len();
            by_hash.insert(hash, files.len());
            files.push(EmbeddedFile {
                game_paths: replacement.game_paths.clone(),
                byte_length,
                hash: Some(hash),
            });
            sources.push(path);
        }

        let metadata = ArchiveMetadata {
            description: description.to_string(),
            customization: snapshot.customization.clone(),
            manipulation: snapshot.manipulation.clone(),
            files,
            file_swaps,
        };

        debug!(
            files = metadata.files.len(),
            swaps = metadata.file_swaps.len(),
            skipped = skipped.len(),
            body_bytes = metadata.body_len(),
            "planned archive"
        );

        Ok(Self {
            metadata,
            sources,
            skipped,
        })
    }

    /// Build a plan from metadata and one source file per embedded entry.
    ///
    /// Entry lengths are taken from the metadata; the sources must match them
    /// when the plan is written.
    pub fn from_parts(metadata: ArchiveMetadata, sources: Vec<PathBuf>) -> Result<Self> {
        if metadata.files.len() != sources.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} embedded entries but {} source files",
                    metadata.files.len(),
                    sources.len()
                ),
            )));
        }

        Ok(Self {
            metadata,
            sources,
            skipped: Vec::new(),
        })
    }

    /// Archive metadata.
    pub fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    /// Replacements that will not be in the archive.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Stream the archive into `sink`, returning the sink and the body length.
    pub fn write_to<W: Write>(
        &self,
        sink: W,
        options: &ArchiveOptions,
        progress: &mut dyn FnMut(WriteProgress),
    ) -> Result<(W, u64)> {
        let mut writer = CompressedWriter::new(sink, options.compression_level)?;
        ArchiveHeader::new(self.metadata.clone()).write_to(&mut writer)?;

        let mut buffer = vec![0u8; options.buffer_size()];
        let total = self.metadata.files.len();
        let mut bytes_done = 0u64;

        for (index, (entry, path)) in self.metadata.files.iter().zip(&self.sources).enumerate() {
            let mut file = File::open(path)?;
            let copied = copy_exact(&mut file, &mut writer, entry.byte_length, &mut buffer)?;

            // A grown file would silently lose its tail
            let mut probe = [0u8; 1];
            let extra = file.read(&mut probe)?;

            if !copied.is_complete() || extra > 0 {
                return Err(Error::SourceChanged {
                    path: path.clone(),
                    expected: entry.byte_length,
                    actual: copied.actual + extra as u64,
                });
            }

            bytes_done += copied.actual;
            progress(WriteProgress {
                files_done: index + 1,
                files_total: total,
                bytes_done,
            });
        }

        let sink = writer.finish()?;
        Ok((sink, bytes_done))
    }

    /// Write the archive to `destination`.
    ///
    /// The archive is staged next to the destination and renamed over it only
    /// once complete; on failure the destination is left untouched.
    pub fn save<P: AsRef<Path>>(&self, destination: P, options: &ArchiveOptions) -> Result<SaveReport> {
        self.save_with_progress(destination, options, &mut |_| {})
    }

    /// [`save`](Self::save), reporting progress after each embedded file.
    pub fn save_with_progress<P: AsRef<Path>>(
        &self,
        destination: P,
        options: &ArchiveOptions,
        progress: &mut dyn FnMut(WriteProgress),
    ) -> Result<SaveReport> {
        let destination = destination.as_ref();
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let staging = NamedTempFile::new_in(parent)?;
        let buffered = BufWriter::with_capacity(options.buffer_size(), staging);
        let (buffered, body_bytes) = self.write_to(buffered, options, progress)?;
        let staging = buffered.into_inner().map_err(|e| e.into_error())?;
        staging.persist(destination).map_err(|e| e.error)?;

        let archive_bytes = fs::metadata(destination)?.len();
        info!(
            path = %destination.display(),
            files = self.metadata.files.len(),
            swaps = self.metadata.file_swaps.len(),
            skipped = self.skipped.len(),
            body_bytes,
            archive_bytes,
            "saved character archive"
        );

        Ok(SaveReport {
            embedded: self.metadata.files.len(),
            swaps: self.metadata.file_swaps.len(),
            skipped: self.skipped.clone(),
            body_bytes,
            archive_bytes,
        })
    }
}

/// Build and save an archive for `snapshot` in one call.
pub fn save_snapshot<P: AsRef<Path>>(
    snapshot: &CharacterSnapshot,
    description: &str,
    store: &dyn ContentStore,
    destination: P,
    options: &ArchiveOptions,
) -> Result<SaveReport> {
    ArchivePlan::build(snapshot, description, store, options)?.save(destination, options)
}
