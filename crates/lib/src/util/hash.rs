//! Content hashing for build inputs.
//!
//! This module provides:
//! - `ContentHash`: A full 64-character SHA-256 of file or directory contents
//! - `hash_file()`: Single file hashing
//! - `hash_directory()`: Deterministic directory hashing
//! - `hash_bytes()`: Arbitrary byte hashing
//!
//! Only contents are hashed, never absolute locations or metadata, so the same
//! input checked out under two different project roots hashes identically.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::OUTPUT_DIR;

/// A full 64-character SHA-256 hash of some content.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while hashing an input.
///
/// A missing input is reported separately from one that exists but could not
/// be read, so callers can tell a typo from a permissions problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileHashError {
  #[error("file not found: {path}")]
  NotFound { path: String },

  #[error("failed to read file {path}: {message}")]
  Read { path: String, message: String },

}

impl FileHashError {
  fn from_io(path: &Path, err: io::Error) -> Self {
    if err.kind() == io::ErrorKind::NotFound {
      FileHashError::NotFound {
        path: path.display().to_string(),
      }
    } else {
      FileHashError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
      }
    }
  }
}

/// Hash either a file or a directory, whichever `path` is.
///
/// Output directories nested in a directory input are skipped; they hold
/// build results, not sources.
pub fn hash_path(path: &Path) -> Result<ContentHash, FileHashError> {
  let metadata = fs::metadata(path).map_err(|e| FileHashError::from_io(path, e))?;
  if metadata.is_dir() {
    hash_directory(path, &[OUTPUT_DIR])
  } else {
    hash_file(path)
  }
}

/// Compute a deterministic hash of a directory's contents.
///
/// The hash includes:
/// - File contents (not metadata like timestamps or permissions)
/// - Directory structure
/// - Symlink targets
///
/// Entries are sorted by path for determinism.
///
/// # Arguments
///
/// * `path` - The directory to hash
/// * `exclude` - File/directory names to skip at any depth
///
/// Any failure while walking or reading is reported against the entry it
/// happened on, as [`FileHashError::NotFound`] or [`FileHashError::Read`].
pub fn hash_directory(path: &Path, exclude: &[&str]) -> Result<ContentHash, FileHashError> {
  let mut entries: Vec<(String, String)> = Vec::new();

  let walker = WalkDir::new(path).sort_by_file_name().into_iter().filter_entry(|e| {
    e.file_name()
      .to_str()
      .map(|name| !exclude.contains(&name))
      .unwrap_or(true)
  });

  for entry in walker {
    let entry = entry.map_err(|e| {
      let at = e.path().unwrap_or(path).to_path_buf();
      let message = e.to_string();
      match e.into_io_error() {
        Some(io) => FileHashError::from_io(&at, io),
        None => FileHashError::Read {
          path: at.display().to_string(),
          message,
        },
      }
    })?;
    let entry_path = entry.path();

    // Relative, `/`-separated so the hash does not depend on the host.
    let rel_path = entry_path
      .strip_prefix(path)
      .unwrap_or(entry_path)
      .components()
      .map(|c| c.as_os_str().to_string_lossy().into_owned())
      .collect::<Vec<_>>()
      .join("/");

    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let entry_hash = if file_type.is_file() {
      let content_hash = hash_file(entry_path)?;
      format!("F:{}:{}", rel_path, content_hash.0)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry_path).map_err(|e| FileHashError::from_io(entry_path, e))?;
      let target_hash = hash_bytes(target.to_string_lossy().as_bytes());
      format!("L:{}:{}", rel_path, target_hash.0)
    } else {
      // Sockets, devices and the like carry no content.
      continue;
    };

    entries.push((rel_path, entry_hash));
  }

  entries.sort_by(|a, b| a.0.cmp(&b.0));

  let mut hasher = Sha256::new();
  for (_, entry_hash) in entries {
    hasher.update(entry_hash.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA256 hash of the file.
pub fn hash_file(path: &Path) -> Result<ContentHash, FileHashError> {
  let mut file = fs::File::open(path).map_err(|e| FileHashError::from_io(path, e))?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|e| FileHashError::from_io(path, e))?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}
