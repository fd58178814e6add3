//! Zstandard transport for whole archives.
//!
//! The header and the body go through a single compression stream. Readers
//! decompress incrementally; nothing here ever holds the whole archive.

use std::io::{self, BufReader, Read, Write};

use crate::header::decompression_or_io;
use crate::{Error, Result};

/// Default compression level, tuned for ratio over speed.
pub const DEFAULT_LEVEL: i32 = 19;

/// Compressing writer wrapping an underlying sink.
pub struct CompressedWriter<W: Write> {
    encoder: zstd::stream::Encoder<'static, W>,
}

impl<W: Write> CompressedWriter<W> {
    /// Start a compression stream at `level`.
    ///
    /// The frame carries a content checksum, which readers verify when they
    /// reach the end of the stream.
    pub fn new(sink: W, level: i32) -> Result<Self> {
        let (min, max) = level_range();
        let mut encoder = zstd::stream::Encoder::new(sink, level.clamp(min, max))
            .map_err(|e| Error::Compression(e.to_string()))?;
        encoder
            .include_checksum(true)
            .map_err(|e| Error::Compression(e.to_string()))?;
        Ok(Self { encoder })
    }

    /// Finish the frame, flush the sink and return it.
    ///
    /// Dropping a writer without calling this leaves an incomplete frame.
    pub fn finish(self) -> Result<W> {
        let mut sink = self
            .encoder
            .finish()
            .map_err(|e| Error::Compression(e.to_string()))?;
        sink.flush()?;
        Ok(sink)
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Decompressing reader over an underlying source.
pub struct CompressedReader<R: Read> {
    decoder: zstd::stream::Decoder<'static, BufReader<R>>,
}

impl<R: Read> CompressedReader<R> {
    /// Start decompressing `source`, reading it in chunks of `buffer_size` bytes.
    pub fn new(source: R, buffer_size: usize) -> Result<Self> {
        let buffered = BufReader::with_capacity(mcdf_common::clamp_buffer_size(buffer_size), source);
        let decoder = zstd::stream::Decoder::with_buffer(buffered)
            .map_err(|e| Error::Decompression(e.to_string()))?;
        Ok(Self { decoder })
    }
}

impl<R: Read> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

/// Compress a complete in-memory buffer.
pub fn compress_bytes(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut writer = CompressedWriter::new(Vec::new(), level)?;
    writer.write_all(data)?;
    writer.finish()
}

/// Decompress a complete in-memory buffer.
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = CompressedReader::new(data, 64 * 1024)?;
    let mut output = Vec::new();
    reader.read_to_end(&mut output).map_err(decompression_or_io)?;
    Ok(output)
}

fn level_range() -> (i32, i32) {
    let range = zstd::compression_level_range();
    (*range.start(), *range.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip() {
        let original = b"Hello, World! This is a test of Zstandard compression.".repeat(50);
        let compressed = compress_bytes(&original, DEFAULT_LEVEL).unwrap();
        assert!(compressed.len() < original.len());
        assert_eq!(decompress_bytes(&compressed).unwrap(), original);
    }

    #[test]
    fn test_small_read_buffer() {
        let original: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = compress_bytes(&original, 3).unwrap();

        let mut reader = CompressedReader::new(&compressed[..], 16).unwrap();
        let mut chunk = [0u8; 1000];
        let mut output = Vec::new();
        loop {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            output.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(output, original);
    }

    #[test]
    fn test_out_of_range_level_is_clamped() {
        let compressed = compress_bytes(b"abc", 10_000).unwrap();
        assert_eq!(decompress_bytes(&compressed).unwrap(), b"abc");
    }

    #[test]
    fn test_frame_carries_checksum() {
        let compressed = compress_bytes(b"checked", DEFAULT_LEVEL).unwrap();
        // Frame header descriptor follows the 4-byte frame magic
        assert_ne!(compressed[4] & 0x04, 0);
    }

    #[test]
    fn test_checksum_mismatch_is_decompression_error() {
        let original = b"integrity".repeat(100);
        let mut compressed = compress_bytes(&original, 3).unwrap();
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;

        let err = decompress_bytes(&compressed).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)), "{err}");
    }

    #[test]
    fn test_not_zstd() {
        let err = decompress_bytes(b"definitely not a zstd frame").unwrap_err();
        assert!(matches!(err, Error::Decompression(_)));
    }
}
