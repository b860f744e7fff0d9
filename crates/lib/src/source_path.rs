//! References to build inputs.
//!
//! A [`SourcePath`] is either a file checked into the project or the output of
//! another build target. Neither variant is ever resolved to an absolute path
//! here: equality and ordering are purely structural so keys stay stable
//! across machines and project roots. Resolution lives behind
//! [`crate::tool::SourcePathResolver`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::CELL_SEPARATOR;
use crate::target::{BuildTarget, TargetParseError};

/// Errors produced while parsing a [`SourcePath`] or [`RelPath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcePathParseError {
  #[error("source path is empty")]
  Empty,

  #[error("source path '{0}' must be relative to the project root")]
  Absolute(String),

  #[error("source path '{0}' escapes the project root")]
  ParentTraversal(String),

  #[error("invalid build target: {0}")]
  Target(#[from] TargetParseError),
}

/// A normalised, `/`-separated path relative to a project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
  /// Validate and normalise a relative path.
  ///
  /// `.` components and repeated separators are dropped; absolute paths and
  /// `..` components are rejected.
  pub fn new(raw: &str) -> Result<Self, SourcePathParseError> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || Path::new(raw).is_absolute() {
      return Err(SourcePathParseError::Absolute(raw.to_string()));
    }

    let mut components = Vec::new();
    for component in unified.split('/') {
      match component {
        "" | "." => continue,
        ".." => return Err(SourcePathParseError::ParentTraversal(raw.to_string())),
        other => components.push(other),
      }
    }

    if components.is_empty() {
      return Err(SourcePathParseError::Empty);
    }

    Ok(Self(components.join("/")))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn as_path(&self) -> &Path {
    Path::new(&self.0)
  }

  /// Join `other` onto this path.
  pub fn join(&self, other: &RelPath) -> RelPath {
    RelPath(format!("{}/{}", self.0, other.0))
  }
}

impl fmt::Display for RelPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for RelPath {
  type Error = SourcePathParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::new(&value)
  }
}

impl From<RelPath> for String {
  fn from(path: RelPath) -> Self {
    path.0
  }
}

/// Reference to build input data.
///
/// The derived ordering is part of the cache format: every `Path` sorts before
/// every `BuildTarget`; paths sort by their normalised string and targets by
/// their fully-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourcePath {
  /// A file relative to the project root.
  Path(RelPath),
  /// The output of another build target.
  BuildTarget(BuildTarget),
}

impl SourcePath {
  /// Parse the argument syntax: `[cell]//base/path:name` is a build target,
  /// everything else a project-relative path.
  ///
  /// A string is only read as a target when it has a `:name` after the `//`
  /// and no `/` in the cell part, so `a//b.txt` stays a path. Something that
  /// looks like a target but is malformed (`//gen:`) is an error rather than
  /// a path.
  pub fn parse(raw: &str) -> Result<Self, SourcePathParseError> {
    if looks_like_target(raw) {
      Ok(SourcePath::BuildTarget(BuildTarget::parse(raw)?))
    } else {
      Ok(SourcePath::Path(RelPath::new(raw)?))
    }
  }

  pub fn path(raw: &str) -> Result<Self, SourcePathParseError> {
    Ok(SourcePath::Path(RelPath::new(raw)?))
  }

  /// The build target this source path refers to, if it is a rule output.
  pub fn build_target(&self) -> Option<&BuildTarget> {
    match self {
      SourcePath::Path(_) => None,
      SourcePath::BuildTarget(target) => Some(target),
    }
  }
}

fn looks_like_target(raw: &str) -> bool {
  match raw.split_once(CELL_SEPARATOR) {
    Some((cell, rest)) => !cell.contains(['/', '\\']) && rest.contains(':'),
    None => false,
  }
}

impl From<BuildTarget> for SourcePath {
  fn from(target: BuildTarget) -> Self {
    SourcePath::BuildTarget(target)
  }
}

impl From<RelPath> for SourcePath {
  fn from(path: RelPath) -> Self {
    SourcePath::Path(path)
  }
}

impl fmt::Display for SourcePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SourcePath::Path(path) => write!(f, "{path}"),
      SourcePath::BuildTarget(target) => write!(f, "{target}"),
    }
  }
}

impl TryFrom<String> for SourcePath {
  type Error = SourcePathParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<SourcePath> for String {
  fn from(path: SourcePath) -> Self {
    path.to_string()
  }
}
