//! Ownership of extracted temporary files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

const PREFIX: &str = "mcdf_";
const SUFFIX: &str = ".tmp";

/// Temporary files created by one extraction.
///
/// Every path is deleted when the set is dropped or [`cleanup`](Self::cleanup)
/// is called, unless [`keep`](Self::keep) handed ownership to the caller.
#[derive(Debug, Default)]
pub struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new uniquely named file in `dir`.
    ///
    /// The file is removed automatically if it is dropped before being
    /// [`adopt`](Self::adopt)ed.
    pub fn create_in(dir: &Path) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(SUFFIX)
            .tempfile_in(dir)
    }

    /// Take ownership of a fully written temporary file, returning its path.
    pub fn adopt(&mut self, file: NamedTempFile) -> io::Result<PathBuf> {
        let (handle, path) = file.keep().map_err(|e| e.error)?;
        drop(handle);
        self.paths.push(path.clone());
        Ok(path)
    }

    /// Paths currently owned.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of owned files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no files are owned.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every owned file.
    ///
    /// Files that are already gone are ignored; other failures are logged and
    /// the remaining files are still deleted. Returns the number removed.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;

        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temporary file"),
            }
        }

        if removed > 0 {
            debug!(removed, "removed temporary files");
        }
        removed
    }

    /// Stop managing the files and return their paths.
    pub fn keep(mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_drop_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut files = TempFiles::new();
            let mut file = TempFiles::create_in(dir.path()).unwrap();
            file.write_all(b"data").unwrap();
            let path = files.adopt(file).unwrap();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_unadopted_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = TempFiles::create_in(dir.path()).unwrap();
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_disarms_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = TempFiles::new();
        files.adopt(TempFiles::create_in(dir.path()).unwrap()).unwrap();

        let kept = files.keep();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].exists());
    }

    #[test]
    fn test_names_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = TempFiles::new();
        let a = files.adopt(TempFiles::create_in(dir.path()).unwrap()).unwrap();
        let b = files.adopt(TempFiles::create_in(dir.path()).unwrap()).unwrap();

        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("mcdf_") && name.ends_with(".tmp"));
        assert_eq!(files.cleanup(), 2);
        assert!(files.is_empty());
    }

    #[test]
    fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = TempFiles::new();
        let path = files.adopt(TempFiles::create_in(dir.path()).unwrap()).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(files.cleanup(), 0);
    }
}
