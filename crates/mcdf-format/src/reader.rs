//! Archive reader and extractor.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use mcdf_common::stream::{copy_exact, drain};
use tracing::{debug, info, warn};

use crate::compression::CompressedReader;
use crate::header::{decompression_or_io, ArchiveHeader};
use crate::metadata::EmbeddedFile;
use crate::store::ContentStore;
use crate::temp::TempFiles;
use crate::{ArchiveOptions, Error, Result};

/// Files produced by extracting an archive.
#[derive(Debug)]
pub struct ExtractedArchive {
    /// Game path to local file (temporary, reused from the store, or swap target).
    pub mapping: BTreeMap<String, PathBuf>,
    /// Temporary files owned by this extraction.
    pub temp_files: TempFiles,
    /// Game paths claimed by more than one entry; the later entry won.
    pub conflicts: Vec<String>,
    /// Embedded entries served from the content store instead of a temporary file.
    pub reused: usize,
    /// Bytes found after the declared body.
    pub trailing_bytes: u64,
}

/// Result of streaming through a whole archive without writing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    /// Embedded entries read.
    pub files: usize,
    /// Body bytes read.
    pub body_bytes: u64,
    /// Bytes found after the declared body.
    pub trailing_bytes: u64,
}

/// A parsed archive with its decompressing stream positioned at the body.
pub struct ArchiveReader<R: Read> {
    header: ArchiveHeader,
    body: CompressedReader<R>,
    buffer_size: usize,
    body_consumed: bool,
}

impl ArchiveReader<File> {
    /// Open an archive file and parse its header.
    pub fn open<P: AsRef<Path>>(path: P, options: &ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let reader = Self::new(File::open(path)?, options)?;
        debug!(
            path = %path.display(),
            files = reader.header.metadata().files.len(),
            "opened character archive"
        );
        Ok(reader)
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Wrap a compressed archive stream and parse its header.
    pub fn new(source: R, options: &ArchiveOptions) -> Result<Self> {
        let mut body = CompressedReader::new(source, options.buffer_size())?;
        let header = ArchiveHeader::read_from(&mut body)?;

        Ok(Self {
            header,
            body,
            buffer_size: options.buffer_size(),
            body_consumed: false,
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Consume the reader, returning the header.
    pub fn into_header(self) -> ArchiveHeader {
        self.header
    }

    /// Extract every embedded file into a new temporary file in `dir`.
    ///
    /// Entries are read strictly in order, each taking exactly its declared
    /// length from the body. When `store` already holds an entry's content the
    /// bytes are skipped and the store's file is mapped instead. File swaps are
    /// mapped last, so a swap overrides an embedded file claiming the same path.
    ///
    /// On any error every temporary file created by this call is removed.
    pub fn extract(&mut self, dir: &Path, store: Option<&dyn ContentStore>) -> Result<ExtractedArchive> {
        self.take_body()?;
        fs::create_dir_all(dir)?;

        let metadata = self.header.metadata();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut temp_files = TempFiles::new();
        let mut mapping = BTreeMap::new();
        let mut conflicts = Vec::new();
        let mut reused = 0;

        for (index, entry) in metadata.files.iter().enumerate() {
            let local = match reusable_path(entry, store) {
                Some(existing) => {
                    let copied = copy_entry(&mut self.body, io::sink(), entry.byte_length, &mut buffer)?;
                    ensure_complete(entry, index, copied)?;
                    reused += 1;
                    existing
                }
                None => {
                    let mut file = TempFiles::create_in(dir)?;
                    let copied = copy_entry(&mut self.body, file.as_file_mut(), entry.byte_length, &mut buffer)?;
                    ensure_complete(entry, index, copied)?;
                    file.as_file_mut().flush()?;
                    temp_files.adopt(file)?
                }
            };

            debug!(
                index,
                len = entry.byte_length,
                local = %local.display(),
                "extracted entry"
            );

            for game_path in &entry.game_paths {
                claim(&mut mapping, &mut conflicts, game_path, local.clone());
            }
        }

        // Reading to the end of the frame checks its checksum
        let trailing_bytes = finish_frame(&mut self.body, &mut buffer, metadata.body_len())?;

        for swap in &metadata.file_swaps {
            for game_path in &swap.game_paths {
                claim(&mut mapping, &mut conflicts, game_path, PathBuf::from(&swap.swap_target));
            }
        }

        info!(
            files = metadata.files.len(),
            temp_files = temp_files.len(),
            reused,
            swaps = metadata.file_swaps.len(),
            paths = mapping.len(),
            "extracted character archive"
        );

        Ok(ExtractedArchive {
            mapping,
            temp_files,
            conflicts,
            reused,
            trailing_bytes,
        })
    }

    /// Read the whole body, checking every entry length and trailing bytes.
    pub fn verify(&mut self) -> Result<VerifyReport> {
        self.take_body()?;

        let mut buffer = vec![0u8; self.buffer_size];
        let mut body_bytes = 0;

        for (index, entry) in self.header.metadata().files.iter().enumerate() {
            let copied = copy_entry(&mut self.body, io::sink(), entry.byte_length, &mut buffer)?;
            ensure_complete(entry, index, copied)?;
            body_bytes += copied;
        }

        let trailing_bytes = finish_frame(&mut self.body, &mut buffer, body_bytes)?;

        Ok(VerifyReport {
            files: self.header.metadata().files.len(),
            body_bytes,
            trailing_bytes,
        })
    }

    /// Read and count whatever remains of the decompressed stream.
    pub fn drain_trailing(&mut self) -> Result<u64> {
        let mut buffer = vec![0u8; self.buffer_size.min(64 * 1024)];
        drain(&mut self.body, &mut buffer).map_err(decompression_or_io)
    }

    fn take_body(&mut self) -> Result<()> {
        if self.body_consumed {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "archive body has already been read",
            )));
        }
        self.body_consumed = true;
        Ok(())
    }
}

/// Parse only the header of the archive at `path`.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<ArchiveHeader> {
    Ok(ArchiveReader::open(path, &ArchiveOptions::default())?.into_header())
}

/// Extract the archive at `path` into `dir`.
pub fn extract_archive<P: AsRef<Path>>(
    path: P,
    dir: &Path,
    store: Option<&dyn ContentStore>,
    options: &ArchiveOptions,
) -> Result<(ArchiveHeader, ExtractedArchive)> {
    let mut reader = ArchiveReader::open(path, options)?;
    let extracted = reader.extract(dir, store)?;
    Ok((reader.into_header(), extracted))
}

/// Sink wrapper that remembers whether a failure came from the write side.
struct Destination<W> {
    inner: W,
    failed: bool,
}

impl<W: Write> Write for Destination<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf).map_err(|e| {
            self.failed = true;
            e
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().map_err(|e| {
            self.failed = true;
            e
        })
    }
}

/// Copy one entry's bytes, returning how many the body supplied.
///
/// Failures writing `sink` are plain I/O errors; failures reading `body` are
/// classified as decompression errors where the decoder reports them so.
fn copy_entry<R, W>(body: &mut R, sink: W, len: u64, buffer: &mut [u8]) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write,
{
    let mut destination = Destination {
        inner: sink,
        failed: false,
    };

    match copy_exact(body, &mut destination, len, buffer) {
        Ok(copied) => Ok(copied.actual),
        Err(e) if destination.failed => Err(Error::Io(e)),
        Err(e) => Err(decompression_or_io(e)),
    }
}

/// Read the rest of the stream, returning the number of trailing bytes.
///
/// A frame cut off after the last body byte still counts as truncated.
fn finish_frame<R: Read + ?Sized>(body: &mut R, buffer: &mut [u8], body_bytes: u64) -> Result<u64> {
    let trailing_bytes = drain(body, buffer).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated {
                what: "end of stream after the body".to_string(),
                expected: body_bytes,
                actual: body_bytes,
            }
        } else {
            decompression_or_io(e)
        }
    })?;

    if trailing_bytes > 0 {
        warn!(trailing_bytes, "archive has bytes after the declared body");
    }
    Ok(trailing_bytes)
}

fn reusable_path(entry: &EmbeddedFile, store: Option<&dyn ContentStore>) -> Option<PathBuf> {
    let path = store?.resolve_path(entry.hash.as_ref()?)?;
    let len = fs::metadata(&path).ok()?.len();
    (len == entry.byte_length).then_some(path)
}

fn ensure_complete(entry: &EmbeddedFile, index: usize, actual: u64) -> Result<()> {
    if actual == entry.byte_length {
        return Ok(());
    }

    let what = match entry.game_paths.iter().next() {
        Some(path) => format!("entry {index} ({path})"),
        None => format!("entry {index}"),
    };
    Err(Error::Truncated {
        what,
        expected: entry.byte_length,
        actual,
    })
}

fn claim(
    mapping: &mut BTreeMap<String, PathBuf>,
    conflicts: &mut Vec<String>,
    game_path: &str,
    local: PathBuf,
) {
    if let Some(previous) = mapping.insert(game_path.to_string(), local) {
        warn!(game_path, previous = %previous.display(), "game path claimed twice, keeping the later entry");
        conflicts.push(game_path.to_string());
    }
}
