//! The mod-application collaborator.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use mcdf_format::CustomizationStrings;

use crate::error::BoxError;

/// Identifies the in-game object an archive is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host integration that stages files and customization onto a target.
///
/// [`ArchiveManager`](crate::ArchiveManager) calls these in a fixed order:
/// `begin_staging`, `clear_staging`, `set_file_mapping`,
/// `set_manipulation_data`, `apply_customization`, `wait_for_visual_settle`,
/// and finally `end_staging`. Once `begin_staging` succeeds, `end_staging` is
/// always called, whatever happens in between.
pub trait ModApplier {
    /// Handle for one exclusive staging scope.
    type Staging;

    /// Enter exclusive staging mode for `target`.
    fn begin_staging(&self, target: TargetId) -> Result<Self::Staging, BoxError>;

    /// Remove whatever an earlier cycle left staged for `target`.
    fn clear_staging(&self, target: TargetId) -> Result<(), BoxError>;

    /// Register the complete game path to local file mapping as one mod set.
    fn set_file_mapping(
        &self,
        staging: &Self::Staging,
        mapping: &BTreeMap<String, PathBuf>,
    ) -> Result<(), BoxError>;

    /// Register the meta-manipulation state with the mod set.
    fn set_manipulation_data(&self, staging: &Self::Staging, data: &str) -> Result<(), BoxError>;

    /// Apply glamour and body-shape payloads to the target.
    fn apply_customization(
        &self,
        target: TargetId,
        customization: &CustomizationStrings,
    ) -> Result<(), BoxError>;

    /// Wait up to `timeout` for the target to finish redrawing.
    ///
    /// Returns `false` on timeout.
    fn wait_for_visual_settle(&self, target: TargetId, timeout: Duration) -> bool;

    /// Leave staging mode.
    fn end_staging(&self, staging: Self::Staging) -> Result<(), BoxError>;
}
