//! Bounded, exact-length stream copies.
//!
//! Archive bodies have no per-entry framing, so every consumer must take exactly
//! the number of bytes an entry declares. [`copy_exact`] never reads past that
//! count, even when the caller's buffer is larger than what remains.

use std::io::{self, Read, Write};

/// Outcome of a bounded copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Copied {
    /// Bytes requested.
    pub expected: u64,
    /// Bytes actually moved before the source ran dry.
    pub actual: u64,
}

impl Copied {
    /// Whether the source supplied every requested byte.
    #[inline]
    pub const fn is_complete(&self) -> bool {
        self.expected == self.actual
    }
}

/// Copy exactly `len` bytes from `reader` into `writer`.
///
/// Each read is limited to `min(buffer.len(), remaining)` bytes. A source that
/// ends early is not an error here; the shortfall is reported through
/// [`Copied::actual`]. An `UnexpectedEof` from the reader (how streaming
/// decompressors report a cut-off frame) is treated as the end of the source.
///
/// # Example
///
/// ```
/// use mcdf_common::stream::copy_exact;
///
/// let mut source: &[u8] = &[1, 2, 3, 4, 5];
/// let mut out = Vec::new();
/// let mut buffer = [0u8; 2];
///
/// let copied = copy_exact(&mut source, &mut out, 3, &mut buffer).unwrap();
/// assert!(copied.is_complete());
/// assert_eq!(out, [1, 2, 3]);
/// assert_eq!(source, [4, 5]);
/// ```
pub fn copy_exact<R, W>(reader: &mut R, writer: &mut W, len: u64, buffer: &mut [u8]) -> io::Result<Copied>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if buffer.is_empty() && len > 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "copy buffer must not be empty",
        ));
    }

    let mut remaining = len;

    while remaining > 0 {
        let chunk = (buffer.len() as u64).min(remaining) as usize;
        let read = match reader.read(&mut buffer[..chunk]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };

        writer.write_all(&buffer[..read])?;
        remaining -= read as u64;
    }

    Ok(Copied {
        expected: len,
        actual: len - remaining,
    })
}

/// Read and discard everything left in `reader`, returning the byte count.
pub fn drain<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> io::Result<u64> {
    let mut total = 0u64;

    loop {
        match reader.read(buffer) {
            Ok(0) => return Ok(total),
            Ok(n) => total += n as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
