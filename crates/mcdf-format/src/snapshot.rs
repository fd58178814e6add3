//! Live character state handed to the archive writer.

use std::collections::BTreeSet;

use mcdf_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::metadata::CustomizationStrings;

/// One replaced file of the character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReplacement {
    /// Game paths served by this replacement.
    pub game_paths: BTreeSet<String>,
    /// Content hash of the replacement file. Unused for swaps.
    #[serde(default)]
    pub hash: Option<ContentHash>,
    /// Game path to redirect to instead of serving file contents.
    #[serde(default)]
    pub swap_target: Option<String>,
}

impl FileReplacement {
    /// A replacement served from content with `hash`.
    pub fn content<I, S>(game_paths: I, hash: ContentHash) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            game_paths: game_paths.into_iter().map(Into::into).collect(),
            hash: Some(hash),
            swap_target: None,
        }
    }

    /// A replacement redirecting to another game path.
    pub fn swap<I, S>(game_paths: I, target: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            game_paths: game_paths.into_iter().map(Into::into).collect(),
            hash: None,
            swap_target: Some(target.into()),
        }
    }

    /// The swap target, if this is a non-empty swap.
    pub fn swap_target(&self) -> Option<&str> {
        self.swap_target.as_deref().filter(|t| !t.is_empty())
    }
}

/// Snapshot of a character's mod-relevant state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    /// Glamour and body-shape payloads.
    #[serde(default)]
    pub customization: CustomizationStrings,
    /// Meta-manipulation state.
    #[serde(default)]
    pub manipulation: String,
    /// Replaced files.
    #[serde(default)]
    pub file_replacements: Vec<FileReplacement>,
}
