//! Content hashes for on-disk inputs.
//!
//! The key engine never reads files directly; it asks a [`FileHashCache`].
//! The default implementation hashes lazily and memoizes per absolute path,
//! while [`PrecomputedFileHashes`] serves hashes computed ahead of time by
//! other infrastructure.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::util::hash::{ContentHash, FileHashError, hash_path};

/// Supplies content hashes for absolute paths.
///
/// Implementations must return the same hash for unchanged contents across
/// runs, and must report a missing file as [`FileHashError::NotFound`].
pub trait FileHashCache: Send + Sync {
  fn get(&self, path: &Path) -> Result<ContentHash, FileHashError>;
}

/// Hashes files (and directories) on first use and remembers the result.
#[derive(Debug, Default)]
pub struct DefaultFileHashCache {
  hashes: RwLock<HashMap<PathBuf, ContentHash>>,
}

impl DefaultFileHashCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Forget the hash of `path`, e.g. after the file changed.
  pub fn invalidate(&self, path: &Path) {
    self.hashes.write().expect("file hash cache lock poisoned").remove(path);
  }

  pub fn clear(&self) {
    self.hashes.write().expect("file hash cache lock poisoned").clear();
  }

  pub fn len(&self) -> usize {
    self.hashes.read().expect("file hash cache lock poisoned").len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl FileHashCache for DefaultFileHashCache {
  fn get(&self, path: &Path) -> Result<ContentHash, FileHashError> {
    if let Some(hash) = self.hashes.read().expect("file hash cache lock poisoned").get(path) {
      return Ok(hash.clone());
    }

    let hash = hash_path(path)?;
    debug!(path = ?path, hash = %hash, "hashed input");
    self
      .hashes
      .write()
      .expect("file hash cache lock poisoned")
      .insert(path.to_path_buf(), hash.clone());
    Ok(hash)
  }
}

/// A fixed table of hashes supplied up front.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedFileHashes {
  hashes: BTreeMap<PathBuf, ContentHash>,
}

impl PrecomputedFileHashes {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, path: impl Into<PathBuf>, hash: ContentHash) -> Self {
    self.hashes.insert(path.into(), hash);
    self
  }

  pub fn insert(&mut self, path: impl Into<PathBuf>, hash: ContentHash) {
    self.hashes.insert(path.into(), hash);
  }
}

impl FileHashCache for PrecomputedFileHashes {
  fn get(&self, path: &Path) -> Result<ContentHash, FileHashError> {
    self.hashes.get(path).cloned().ok_or_else(|| FileHashError::NotFound {
      path: path.display().to_string(),
    })
  }
}
