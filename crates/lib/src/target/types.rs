use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::CELL_SEPARATOR;

/// Errors produced while parsing a build target string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetParseError {
  #[error("build target '{0}' is missing '//'")]
  MissingCellSeparator(String),

  #[error("build target '{0}' is missing ':<name>'")]
  MissingName(String),

  #[error("build target '{0}' has an empty name")]
  EmptyName(String),

  #[error("build target '{input}' has an invalid component '{component}'")]
  InvalidComponent { input: String, component: String },
}

/// Unique identifier of a rule within a project.
///
/// Equality, ordering and hashing all go through the canonical
/// `cell//base/path:name` form, so sorted collections of targets iterate in the
/// same order on every machine.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildTarget {
  cell: String,
  base_path: String,
  short_name: String,
  fully_qualified: String,
}

impl BuildTarget {
  /// Create a target from its components.
  ///
  /// `base_path` uses `/` as separator and must not start or end with one.
  pub fn new(cell: &str, base_path: &str, short_name: &str) -> Result<Self, TargetParseError> {
    let fully_qualified = format!("{cell}{CELL_SEPARATOR}{base_path}:{short_name}");
    validate_components(&fully_qualified, cell, base_path, short_name)?;
    Ok(Self {
      cell: cell.to_string(),
      base_path: base_path.to_string(),
      short_name: short_name.to_string(),
      fully_qualified,
    })
  }

  /// Parse a target of the form `[cell]//base/path:name`.
  pub fn parse(input: &str) -> Result<Self, TargetParseError> {
    let (cell, rest) = input
      .split_once(CELL_SEPARATOR)
      .ok_or_else(|| TargetParseError::MissingCellSeparator(input.to_string()))?;
    let (base_path, short_name) = rest
      .rsplit_once(':')
      .ok_or_else(|| TargetParseError::MissingName(input.to_string()))?;
    Self::new(cell, base_path, short_name)
  }

  /// The cell this target lives in. Empty for the root cell.
  pub fn cell(&self) -> &str {
    &self.cell
  }

  /// Directory of the target relative to its cell root, `/`-separated.
  pub fn base_path(&self) -> &str {
    &self.base_path
  }

  /// The name after the `:`.
  pub fn short_name(&self) -> &str {
    &self.short_name
  }

  /// The canonical `cell//base/path:name` string.
  pub fn fully_qualified_name(&self) -> &str {
    &self.fully_qualified
  }
}

fn validate_components(input: &str, cell: &str, base_path: &str, short_name: &str) -> Result<(), TargetParseError> {
  if short_name.is_empty() {
    return Err(TargetParseError::EmptyName(input.to_string()));
  }

  let invalid = |component: &str| TargetParseError::InvalidComponent {
    input: input.to_string(),
    component: component.to_string(),
  };

  if short_name.contains(['/', ':']) {
    return Err(invalid(short_name));
  }
  if cell.contains(['/', ':']) {
    return Err(invalid(cell));
  }
  if !base_path.is_empty() {
    for component in base_path.split('/') {
      if component.is_empty() || component == "." || component == ".." || component.contains(':') {
        return Err(invalid(component));
      }
    }
  }

  Ok(())
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.fully_qualified)
  }
}

impl fmt::Debug for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "BuildTarget({})", self.fully_qualified)
  }
}

impl PartialEq for BuildTarget {
  fn eq(&self, other: &Self) -> bool {
    self.fully_qualified == other.fully_qualified
  }
}

impl Eq for BuildTarget {}

impl Hash for BuildTarget {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.fully_qualified.hash(state);
  }
}

impl PartialOrd for BuildTarget {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for BuildTarget {
  fn cmp(&self, other: &Self) -> Ordering {
    self.fully_qualified.cmp(&other.fully_qualified)
  }
}

impl FromStr for BuildTarget {
  type Err = TargetParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl TryFrom<String> for BuildTarget {
  type Error = TargetParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::parse(&value)
  }
}

impl From<BuildTarget> for String {
  fn from(target: BuildTarget) -> Self {
    target.fully_qualified
  }
}
