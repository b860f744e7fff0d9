//! Project roots and cell lookup.
//!
//! The engine never reads directories or walks trees itself; it only needs to
//! know where a project lives so relative [`SourcePath`]s can be handed to the
//! content hasher and rule outputs can be located.
//!
//! [`SourcePath`]: crate::source_path::SourcePath

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::consts::OUTPUT_DIR;
use crate::source_path::RelPath;

/// The root of a project on disk.
///
/// Rules hold this behind an [`Arc`] since every rule in a cell shares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFilesystem {
  root: PathBuf,
}

impl ProjectFilesystem {
  pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
    Arc::new(Self { root: root.into() })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Absolute location of a project-relative path.
  pub fn resolve(&self, path: &RelPath) -> PathBuf {
    self.root.join(path.as_path())
  }

  /// Directory where rule outputs are written.
  pub fn output_dir(&self) -> PathBuf {
    self.root.join(OUTPUT_DIR)
  }
}

/// Maps cell names to the roots of their projects.
///
/// The root cell is registered under the empty name.
#[derive(Debug, Clone, Default)]
pub struct CellPathResolver {
  cells: BTreeMap<String, Arc<ProjectFilesystem>>,
}

impl CellPathResolver {
  /// A resolver knowing only the root cell.
  pub fn new(root: Arc<ProjectFilesystem>) -> Self {
    let mut cells = BTreeMap::new();
    cells.insert(String::new(), root);
    Self { cells }
  }

  pub fn with_cell(mut self, name: &str, filesystem: Arc<ProjectFilesystem>) -> Self {
    self.cells.insert(name.to_string(), filesystem);
    self
  }

  /// Filesystem for the given cell name.
  pub fn cell(&self, name: &str) -> Option<&Arc<ProjectFilesystem>> {
    self.cells.get(name)
  }

  pub fn cell_names(&self) -> impl Iterator<Item = &str> {
    self.cells.keys().map(String::as_str)
  }
}
