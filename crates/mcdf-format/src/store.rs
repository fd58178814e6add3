//! Content-addressed local file store.
//!
//! The archive writer asks a [`ContentStore`] where the bytes for a hash live;
//! the extractor asks whether it can skip writing bytes the store already has.
//! [`DirectoryStore`] is a store backed by a flat cache directory whose files
//! are named `<HASH>` or `<HASH>.<ext>`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use mcdf_common::ContentHash;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::Result;

/// Maps content hashes to local files and back.
pub trait ContentStore {
    /// Local path holding the content for `hash`, if known.
    fn resolve_path(&self, hash: &ContentHash) -> Option<PathBuf>;

    /// Content hash of the file at `path`, if it can be determined.
    fn hash_for_path(&self, path: &Path) -> Option<ContentHash>;
}

impl<S: ContentStore + ?Sized> ContentStore for &S {
    fn resolve_path(&self, hash: &ContentHash) -> Option<PathBuf> {
        (**self).resolve_path(hash)
    }

    fn hash_for_path(&self, path: &Path) -> Option<ContentHash> {
        (**self).hash_for_path(path)
    }
}

/// A store backed by a cache directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    by_hash: HashMap<ContentHash, PathBuf>,
    by_path: HashMap<PathBuf, ContentHash>,
}

impl DirectoryStore {
    /// Index every hash-named file under `root`, creating it if missing.
    ///
    /// Files whose stem is not a hash are ignored.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let mut store = Self {
            root,
            by_hash: HashMap::new(),
            by_path: HashMap::new(),
        };

        for entry in WalkDir::new(&store.root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable cache entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if let Some(hash) = hash_from_file_name(&path) {
                store.index(hash, path);
            }
        }

        debug!(root = %store.root.display(), files = store.len(), "indexed content store");
        Ok(store)
    }

    /// Directory the store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Whether the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Copy `source` into the store under its content hash.
    ///
    /// The source's extension is kept. Content already present is not copied again.
    pub fn insert<P: AsRef<Path>>(&mut self, source: P) -> Result<ContentHash> {
        let source = source.as_ref();
        let hash = ContentHash::of_file(source)?;

        if self.by_hash.contains_key(&hash) {
            return Ok(hash);
        }

        let mut name = hash.to_string();
        if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
            name.push('.');
            name.push_str(ext);
        }

        let target = self.root.join(name);
        fs::copy(source, &target)?;
        self.index(hash, target);

        Ok(hash)
    }

    fn index(&mut self, hash: ContentHash, path: PathBuf) {
        self.by_path.insert(path.clone(), hash);
        self.by_hash.insert(hash, path);
    }
}

impl ContentStore for DirectoryStore {
    fn resolve_path(&self, hash: &ContentHash) -> Option<PathBuf> {
        self.by_hash.get(hash).filter(|p| p.is_file()).cloned()
    }

    fn hash_for_path(&self, path: &Path) -> Option<ContentHash> {
        if let Some(hash) = self.by_path.get(path) {
            return Some(*hash);
        }

        match ContentHash::of_file(path) {
            Ok(hash) => Some(hash),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "could not hash file");
                None
            }
        }
    }
}

fn hash_from_file_name(path: &Path) -> Option<ContentHash> {
    path.file_stem()?.to_str()?.parse().ok()
}
