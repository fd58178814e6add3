//! Archive header framing.
//!
//! The decompressed stream starts with:
//! - 4 bytes: Magic (`MCDF`)
//! - 1 byte: Version (1)
//! - 4 bytes: Metadata length (i32, little-endian)
//! - N bytes: Metadata (UTF-8 JSON)
//!
//! The body follows immediately.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::metadata::ArchiveMetadata;
use crate::{Error, Result};

/// Magic bytes of the current format generation.
pub const MAGIC: [u8; 4] = *b"MCDF";

/// Magic bytes of the older, letter-swapped format generation.
pub const LEGACY_MAGIC: [u8; 4] = *b"MCFD";

/// The only version with a known body layout.
pub const CURRENT_VERSION: u8 = 1;

/// Size of the fixed part of the header (magic, version, length).
pub const FIXED_HEADER_LEN: usize = 4 + 1 + 4;

/// Parsed archive header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    version: u8,
    metadata: ArchiveMetadata,
}

impl ArchiveHeader {
    /// Create a current-version header for `metadata`.
    pub fn new(metadata: ArchiveMetadata) -> Self {
        Self {
            version: CURRENT_VERSION,
            metadata,
        }
    }

    /// Format version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Decoded metadata.
    pub fn metadata(&self) -> &ArchiveMetadata {
        &self.metadata
    }

    /// Consume the header, returning its metadata.
    pub fn into_metadata(self) -> ArchiveMetadata {
        self.metadata
    }

    /// Number of body bytes that follow the header.
    pub fn expected_body_len(&self) -> u64 {
        self.metadata.body_len()
    }

    /// Number of distinct game paths the archive maps.
    pub fn game_path_count(&self) -> usize {
        self.metadata.game_path_count()
    }

    /// Write the header, returning the number of bytes written.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        let blob = self.metadata.to_json()?;
        let length = i32::try_from(blob.len()).map_err(|_| Error::MetadataTooLarge(blob.len()))?;

        writer.write_all(&MAGIC)?;
        writer.write_u8(self.version)?;
        writer.write_i32::<LittleEndian>(length)?;
        writer.write_all(&blob)?;

        Ok((FIXED_HEADER_LEN + blob.len()) as u64)
    }

    /// Read a header, leaving `reader` positioned at the first body byte.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let magic = read_magic(reader)?;
        match magic {
            MAGIC => {}
            LEGACY_MAGIC => return Err(Error::LegacyFormat),
            other => {
                return Err(Error::InvalidMagic {
                    expected: MAGIC,
                    actual: other.to_vec(),
                })
            }
        }

        let version = reader
            .read_u8()
            .map_err(|e| truncated_or(e, "version byte", 1, 0))?;
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let length = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| truncated_or(e, "metadata length", 4, 0))?;
        let length = u64::try_from(length).map_err(|_| Error::InvalidMetadataLength(length))?;

        // Never trust the length for an up-front allocation
        let mut blob = Vec::new();
        match reader.take(length).read_to_end(&mut blob) {
            Ok(_) => {}
            Err(e) => return Err(truncated_or(e, "metadata", length, blob.len() as u64)),
        }
        if (blob.len() as u64) < length {
            return Err(Error::Truncated {
                what: "metadata".to_string(),
                expected: length,
                actual: blob.len() as u64,
            });
        }

        let metadata = ArchiveMetadata::from_json(&blob)?;
        debug!(
            version,
            metadata_len = length,
            files = metadata.files.len(),
            swaps = metadata.file_swaps.len(),
            "parsed archive header"
        );

        Ok(Self { version, metadata })
    }
}

/// Read the four magic bytes.
///
/// A stream that ends cleanly before four bytes is not an archive. A stream
/// the decoder reports as cut off (`UnexpectedEof`) is a truncated archive.
fn read_magic<R: Read + ?Sized>(reader: &mut R) -> Result<[u8; 4]> {
    let mut magic = [0u8; 4];
    let mut filled = 0;

    while filled < magic.len() {
        match reader.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(truncated_or(e, "magic", magic.len() as u64, filled as u64)),
        }
    }

    if filled < magic.len() {
        return Err(Error::InvalidMagic {
            expected: MAGIC,
            actual: magic[..filled].to_vec(),
        });
    }

    Ok(magic)
}

fn truncated_or(err: io::Error, what: &str, expected: u64, actual: u64) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated {
            what: what.to_string(),
            expected,
            actual,
        }
    } else {
        decompression_or_io(err)
    }
}

/// Streaming decoders report undecodable input as `Other`/`InvalidData`.
pub(crate) fn decompression_or_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::Other => Error::Decompression(err.to_string()),
        _ => Error::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EmbeddedFile;

    fn encode(header: &ArchiveHeader) -> Vec<u8> {
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        out
    }

    fn raw_header(magic: &[u8], version: u8, blob: &[u8]) -> Vec<u8> {
        let mut out = magic.to_vec();
        out.push(version);
        out.extend_from_slice(&(blob.len() as i32).to_le_bytes());
        out.extend_from_slice(blob);
        out
    }

    #[test]
    fn test_layout() {
        let header = ArchiveHeader::new(ArchiveMetadata::default());
        let bytes = encode(&header);
        let blob = ArchiveMetadata::default().to_json().unwrap();

        assert_eq!(&bytes[..4], b"MCDF");
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..9], &(blob.len() as i32).to_le_bytes());
        assert_eq!(&bytes[9..], &blob[..]);
    }

    #[test]
    fn test_reader_positioned_after_metadata() {
        let mut metadata = ArchiveMetadata::default();
        metadata.files.push(EmbeddedFile::new(["a.mdl"], 3));
        let header = ArchiveHeader::new(metadata);

        let mut bytes = encode(&header);
        bytes.extend_from_slice(&[1, 2, 3]);

        let mut cursor = &bytes[..];
        let parsed = ArchiveHeader::read_from(&mut cursor).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.expected_body_len(), 3);
        assert_eq!(cursor, [1, 2, 3]);
    }

    #[test]
    fn test_bad_magic() {
        let bytes = raw_header(b"ABCD", 1, b"{}");
        let err = ArchiveHeader::read_from(&mut &bytes[..]).unwrap_err();
        match err {
            Error::InvalidMagic { actual, .. } => assert_eq!(actual, b"ABCD"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_stream_is_bad_magic() {
        let err = ArchiveHeader::read_from(&mut &b"MC"[..]).unwrap_err();
        assert!(matches!(err, Error::InvalidMagic { .. }));
    }

    #[test]
    fn test_legacy_magic() {
        let bytes = raw_header(&LEGACY_MAGIC, 1, b"{}");
        let err = ArchiveHeader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, Error::LegacyFormat));
    }

    #[test]
    fn test_unsupported_version_skips_metadata() {
        // Metadata is garbage; a version gate that parsed it would fail differently
        let bytes = raw_header(&MAGIC, 2, b"not json");
        let err = ArchiveHeader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(2)));
    }

    #[test]
    fn test_negative_length() {
        let mut bytes = MAGIC.to_vec();
        bytes.push(1);
        bytes.extend_from_slice(&(-5i32).to_le_bytes());
        let err = ArchiveHeader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, Error::InvalidMetadataLength(-5)));
    }

    #[test]
    fn test_truncated_metadata() {
        let mut bytes = raw_header(&MAGIC, 1, b"{\"Description\":\"x\"}");
        bytes.truncate(bytes.len() - 4);
        let err = ArchiveHeader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
    }

    /// Hands out its data, then fails the way a decoder does on a cut frame.
    struct CutOff<'a>(&'a [u8]);

    impl Read for CutOff<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "incomplete frame"));
            }
            let n = buf.len().min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_cut_frame_before_magic_is_truncation() {
        let err = ArchiveHeader::read_from(&mut CutOff(b"")).unwrap_err();
        match err {
            Error::Truncated { what, expected, actual } => {
                assert_eq!(what, "magic");
                assert_eq!((expected, actual), (4, 0));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = ArchiveHeader::read_from(&mut CutOff(b"MC")).unwrap_err();
        assert!(matches!(err, Error::Truncated { actual: 2, .. }), "{err}");
    }

    #[test]
    fn test_cut_frame_inside_metadata_is_truncation() {
        let blob = b"{\"Description\":\"cut short\"}";
        let bytes = raw_header(&MAGIC, 1, blob);
        let cut = bytes.len() - 5;

        let err = ArchiveHeader::read_from(&mut CutOff(&bytes[..cut])).unwrap_err();
        match err {
            Error::Truncated { what, expected, actual } => {
                assert_eq!(what, "metadata");
                assert_eq!(expected, blob.len() as u64);
                assert_eq!(actual, blob.len() as u64 - 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_metadata() {
        let bytes = raw_header(&MAGIC, 1, b"{\"Files\": 7}");
        let err = ArchiveHeader::read_from(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, Error::CorruptMetadata(_)));
    }
}
