//! Content hash type.
//!
//! Files referenced by a character archive are identified by the SHA-256 digest
//! of their contents. The canonical text form is 64 uppercase hex characters,
//! which is also the file stem used by content-addressed caches.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Length of a digest in bytes.
pub const HASH_LEN: usize = 32;

/// A SHA-256 content hash.
///
/// Format: 64 hex characters, displayed uppercase, parsed case-insensitively.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentHash {
    bytes: [u8; HASH_LEN],
}

impl ContentHash {
    /// Create a hash from raw digest bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self { bytes }
    }

    /// Get the raw digest bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.bytes
    }

    /// Hash an in-memory byte slice.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from_bytes(Sha256::digest(data).into())
    }

    /// Hash everything a reader yields, using a bounded buffer.
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(Self::from_bytes(hasher.finalize().into()))
    }

    /// Hash the contents of a file on disk.
    pub fn of_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::of_reader(File::open(path)?)?)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.bytes))
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != HASH_LEN * 2 {
            return Err(Error::InvalidHash(format!(
                "expected {} hex characters, got {}",
                HASH_LEN * 2,
                s.len()
            )));
        }

        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::InvalidHash(e.to_string()))?;
        Ok(Self { bytes })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
