//! Loading and applying MCDF character archives.
//!
//! [`ArchiveManager`] sequences a whole apply cycle: it extracts the archive
//! into temporary files, hands the resulting path mapping and customization
//! payloads to a [`ModApplier`], waits for the target to redraw, and removes
//! every temporary file before returning, whether the cycle succeeded or not.
//!
//! Only one save, load or apply cycle runs per manager at a time. A request
//! made while another cycle is running fails with [`Error::Busy`], which is
//! retryable.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mcdf_apply::{ArchiveManager, CancellationToken, ManagerConfig, ModApplier, TargetId};
//!
//! fn apply_file<A: ModApplier>(applier: A, archive: &Path) -> mcdf_apply::Result<()> {
//!     let manager = ArchiveManager::new(applier, ManagerConfig::new("staging"));
//!     let loaded = manager.load(archive)?;
//!     let report = manager.apply(&loaded, TargetId(201), &CancellationToken::new())?;
//!     println!("{} paths applied, settled: {}", report.paths, report.settled);
//!     manager.clear(loaded);
//!     Ok(())
//! }
//! ```

mod applier;
mod error;
mod manager;
mod state;

pub use applier::{ModApplier, TargetId};
pub use error::{BoxError, Error, Result};
pub use manager::{
    ApplyReport, ArchiveManager, LoadedArchive, ManagerConfig, DEFAULT_SETTLE_TIMEOUT,
};
pub use state::{CancellationToken, Operation, WorkState};
