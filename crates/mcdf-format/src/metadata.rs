//! Archive metadata model.
//!
//! The metadata blob is UTF-8 JSON. Keys are PascalCase, unknown keys are
//! ignored and optional strings default to empty, so writers may add fields
//! without breaking older readers.

use std::collections::BTreeSet;

use mcdf_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Named customization payloads applied to the target after its files are staged.
///
/// The strings are opaque to the archive codec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationStrings {
    /// Glamour (equipment and appearance) state.
    #[serde(rename = "GlamourerData", default)]
    pub glamour: String,
    /// Body-shape state.
    #[serde(rename = "CustomizePlusData", default)]
    pub body_shape: String,
}

impl CustomizationStrings {
    /// Whether neither payload carries data.
    pub fn is_empty(&self) -> bool {
        self.glamour.is_empty() && self.body_shape.is_empty()
    }
}

/// A file whose raw bytes are stored inline in the archive body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFile {
    /// Game paths that all resolve to this content.
    #[serde(rename = "GamePaths")]
    pub game_paths: BTreeSet<String>,
    /// Exact number of body bytes belonging to this entry.
    #[serde(rename = "Length")]
    pub byte_length: u64,
    /// Content hash of the bytes, when the writer knew it.
    #[serde(rename = "Hash", default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
}

impl EmbeddedFile {
    /// Create an entry for `byte_length` bytes shared by `game_paths`.
    pub fn new<I, S>(game_paths: I, byte_length: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            game_paths: game_paths.into_iter().map(Into::into).collect(),
            byte_length,
            hash: None,
        }
    }

    /// Attach the content hash.
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// Game paths redirected to another existing game path. No bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSwap {
    /// Game paths to redirect.
    #[serde(rename = "GamePaths")]
    pub game_paths: BTreeSet<String>,
    /// Game path they are redirected to.
    #[serde(rename = "FileSwapPath")]
    pub swap_target: String,
}

impl FileSwap {
    /// Create a swap redirecting `game_paths` to `swap_target`.
    pub fn new<I, S>(game_paths: I, swap_target: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            game_paths: game_paths.into_iter().map(Into::into).collect(),
            swap_target: swap_target.into(),
        }
    }
}

/// Everything an archive says about a character besides the raw file bytes.
///
/// The order of [`files`](Self::files) is the order of their bytes in the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Owner-supplied label.
    #[serde(rename = "Description", default)]
    pub description: String,
    /// Glamour and body-shape payloads.
    #[serde(flatten)]
    pub customization: CustomizationStrings,
    /// Meta-manipulation state registered alongside the file mapping.
    #[serde(rename = "ManipulationData", default)]
    pub manipulation: String,
    /// Embedded files, in body order.
    #[serde(rename = "Files", default)]
    pub files: Vec<EmbeddedFile>,
    /// File swaps.
    #[serde(rename = "FileSwaps", default)]
    pub file_swaps: Vec<FileSwap>,
}

impl ArchiveMetadata {
    /// Decode metadata from its JSON blob.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::CorruptMetadata)
    }

    /// Encode metadata as its JSON blob.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::CorruptMetadata)
    }

    /// Total body length: the sum of every embedded entry's length.
    pub fn body_len(&self) -> u64 {
        self.files.iter().map(|f| f.byte_length).sum()
    }

    /// Number of distinct game paths claimed by embedded files and swaps.
    pub fn game_path_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| f.game_paths.iter())
            .chain(self.file_swaps.iter().flat_map(|s| s.game_paths.iter()))
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchiveMetadata {
        ArchiveMetadata {
            description: "test character".to_string(),
            customization: CustomizationStrings {
                glamour: "glamour-base64".to_string(),
                body_shape: "shape-base64".to_string(),
            },
            manipulation: "manip".to_string(),
            files: vec![
                EmbeddedFile::new(["chara/a.mdl", "chara/b.mdl"], 10)
                    .with_hash(ContentHash::of_bytes(b"a")),
                EmbeddedFile::new(["chara/c.tex"], 5),
            ],
            file_swaps: vec![FileSwap::new(["chara/d.mtrl"], "chara/e.mtrl")],
        }
    }

    #[test]
    fn test_json_keys() {
        let json = String::from_utf8(sample().to_json().unwrap()).unwrap();
        for key in [
            "\"Description\"",
            "\"GlamourerData\"",
            "\"CustomizePlusData\"",
            "\"ManipulationData\"",
            "\"Files\"",
            "\"GamePaths\"",
            "\"Length\"",
            "\"Hash\"",
            "\"FileSwaps\"",
            "\"FileSwapPath\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn test_decode_encoded() {
        let metadata = sample();
        let decoded = ArchiveMetadata::from_json(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_missing_and_unknown_keys() {
        let json = br#"{
            "FileSwaps": [],
            "Files": [{"Length": 3, "GamePaths": ["a.mdl"]}],
            "SomethingNew": 42
        }"#;
        let metadata = ArchiveMetadata::from_json(json).unwrap();
        assert!(metadata.description.is_empty());
        assert!(metadata.customization.is_empty());
        assert_eq!(metadata.files.len(), 1);
        assert_eq!(metadata.files[0].hash, None);
        assert_eq!(metadata.body_len(), 3);
    }

    #[test]
    fn test_corrupt_json() {
        let err = ArchiveMetadata::from_json(b"{\"Files\": [").unwrap_err();
        assert!(matches!(err, Error::CorruptMetadata(_)));
    }

    #[test]
    fn test_wrong_field_type() {
        let err = ArchiveMetadata::from_json(br#"{"Files": [{"GamePaths": [], "Length": -1}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::CorruptMetadata(_)));
    }

    #[test]
    fn test_body_len_and_path_count() {
        let metadata = sample();
        assert_eq!(metadata.body_len(), 15);
        assert_eq!(metadata.game_path_count(), 4);
    }
}
