//! Save, load and apply cycles.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mcdf_format::{
    ArchiveHeader, ArchiveOptions, ArchivePlan, ArchiveReader, CharacterSnapshot, ContentStore,
    ExtractedArchive, SaveReport,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::applier::{ModApplier, TargetId};
use crate::state::{CancellationToken, Operation, WorkGuard, WorkState};
use crate::{Error, Result};

/// Default bound on waiting for the target to redraw.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for an [`ArchiveManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory receiving temporary extraction files.
    pub staging_dir: PathBuf,
    /// Archive read/write tuning.
    pub archive: ArchiveOptions,
    /// How long to wait for the target to redraw after customization.
    pub settle_timeout: Duration,
}

impl ManagerConfig {
    /// Default configuration extracting into `staging_dir`.
    pub fn new<P: Into<PathBuf>>(staging_dir: P) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            archive: ArchiveOptions::default(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }
}

/// An archive whose header has been read and is ready to apply.
#[derive(Debug, Clone)]
pub struct LoadedArchive {
    path: PathBuf,
    header: ArchiveHeader,
}

impl LoadedArchive {
    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }
}

/// Outcome of a successful apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    /// Game paths registered with the collaborator.
    pub paths: usize,
    /// Temporary files created by extraction.
    pub temp_files: usize,
    /// Embedded entries served from the content store.
    pub reused: usize,
    /// Whether the target finished redrawing before the timeout.
    pub settled: bool,
}

/// Runs save, load and apply cycles one at a time.
pub struct ArchiveManager<A: ModApplier> {
    applier: A,
    config: ManagerConfig,
    store: Option<Arc<dyn ContentStore + Send + Sync>>,
    state: Mutex<WorkState>,
}

impl<A: ModApplier> ArchiveManager<A> {
    /// Create an idle manager.
    pub fn new(applier: A, config: ManagerConfig) -> Self {
        Self {
            applier,
            config,
            store: None,
            state: Mutex::new(WorkState::Idle),
        }
    }

    /// Let extraction map entries the store already holds instead of copying them.
    pub fn with_store(mut self, store: Arc<dyn ContentStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    /// The collaborator.
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Configuration in use.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> WorkState {
        *self.state.lock()
    }

    /// Whether a cycle is running.
    pub fn is_working(&self) -> bool {
        self.state() != WorkState::Idle
    }

    fn begin(&self, operation: Operation) -> Result<WorkGuard<'_>> {
        WorkGuard::try_acquire(&self.state, operation).ok_or_else(|| {
            debug!(%operation, state = ?self.state(), "rejecting request while busy");
            Error::Busy
        })
    }

    /// Write `snapshot` to `destination`.
    pub fn save(
        &self,
        snapshot: &CharacterSnapshot,
        description: &str,
        destination: &Path,
        store: &dyn ContentStore,
    ) -> Result<SaveReport> {
        let _guard = self.begin(Operation::Save)?;

        let plan = ArchivePlan::build(snapshot, description, store, &self.config.archive)?;
        Ok(plan.save(destination, &self.config.archive)?)
    }

    /// Read and validate the header of the archive at `path`.
    ///
    /// Nothing is extracted until [`apply`](Self::apply).
    pub fn load(&self, path: &Path) -> Result<LoadedArchive> {
        let _guard = self.begin(Operation::Load)?;

        let header = ArchiveReader::open(path, &self.config.archive)?.into_header();
        info!(
            path = %path.display(),
            description = %header.metadata().description,
            files = header.metadata().files.len(),
            swaps = header.metadata().file_swaps.len(),
            body_bytes = header.expected_body_len(),
            "loaded character archive"
        );

        Ok(LoadedArchive {
            path: path.to_path_buf(),
            header,
        })
    }

    /// Extract `loaded` and apply it to `target`.
    ///
    /// Every temporary file created by extraction is removed before this
    /// returns, on success and on every error path.
    pub fn apply(
        &self,
        loaded: &LoadedArchive,
        target: TargetId,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let _guard = self.begin(Operation::Apply)?;

        let mut reader = ArchiveReader::open(&loaded.path, &self.config.archive)?;
        if reader.header() != &loaded.header {
            warn!(path = %loaded.path.display(), "archive changed since it was loaded, applying current contents");
        }

        let store = self.store.as_deref().map(|s| s as &dyn ContentStore);
        let mut extracted = reader.extract(&self.config.staging_dir, store)?;

        let result = self.stage(reader.header(), &extracted, target, cancel);

        let removed = extracted.temp_files.cleanup();
        debug!(removed, %target, "cleaned up after apply");

        let settled = result?;
        Ok(ApplyReport {
            paths: extracted.mapping.len(),
            temp_files: removed,
            reused: extracted.reused,
            settled,
        })
    }

    /// Drop a loaded archive.
    pub fn clear(&self, loaded: LoadedArchive) {
        debug!(path = %loaded.path.display(), "cleared loaded archive");
    }

    /// Run the staging sequence, always ending staging once it has begun.
    fn stage(
        &self,
        header: &ArchiveHeader,
        extracted: &ExtractedArchive,
        target: TargetId,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let staging = self
            .applier
            .begin_staging(target)
            .map_err(Error::collaborator("begin staging"))?;

        let result = self.stage_within(&staging, header, extracted, target, cancel);
        let teardown = self
            .applier
            .end_staging(staging)
            .map_err(Error::collaborator("end staging"));

        let settled = result?;
        teardown?;
        Ok(settled)
    }

    fn stage_within(
        &self,
        staging: &A::Staging,
        header: &ArchiveHeader,
        extracted: &ExtractedArchive,
        target: TargetId,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let metadata = header.metadata();

        self.applier
            .clear_staging(target)
            .map_err(Error::collaborator("clear staging"))?;
        self.applier
            .set_file_mapping(staging, &extracted.mapping)
            .map_err(Error::collaborator("set file mapping"))?;
        self.applier
            .set_manipulation_data(staging, &metadata.manipulation)
            .map_err(Error::collaborator("set manipulation data"))?;
        info!(%target, paths = extracted.mapping.len(), "staged archive files");

        if cancel.is_cancelled() {
            info!(%target, "apply cancelled before customization");
            return Err(Error::Cancelled);
        }

        self.applier
            .apply_customization(target, &metadata.customization)
            .map_err(Error::collaborator("apply customization"))?;

        let settled = self
            .applier
            .wait_for_visual_settle(target, self.config.settle_timeout);
        if settled {
            info!(%target, "applied character archive");
        } else {
            warn!(%target, timeout = ?self.config.settle_timeout, "target did not settle before timeout");
        }

        Ok(settled)
    }
}
