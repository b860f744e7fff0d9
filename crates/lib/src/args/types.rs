use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::target::BuildTarget;

/// An argument that failed shape or type constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid target {target}: field '{field}': {message}")]
pub struct ValidationError {
  /// The target as written; it may itself be what failed to parse.
  pub target: String,
  pub field: String,
  pub message: String,
}

impl ValidationError {
  pub fn new(target: impl fmt::Display, field: &str, message: impl Into<String>) -> Self {
    Self {
      target: target.to_string(),
      field: field.to_string(),
      message: message.into(),
    }
  }

  /// Shorthand for a required field that was not provided.
  pub fn missing(target: impl fmt::Display, field: &str) -> Self {
    Self::new(target, field, "required field is missing")
  }
}

/// Arguments that declare dependencies on other targets.
///
/// Lets graph-construction code find edges without knowing the rule kind.
pub trait HasDeclaredDeps {
  fn declared_deps(&self) -> &BTreeSet<BuildTarget>;
}

/// A validated, immutable argument for one rule kind.
pub trait ConstructorArg: HasDeclaredDeps + fmt::Debug + Send + Sync + 'static {
  /// Every target this argument references: declared deps plus any targets
  /// named through source paths. These become target graph edges.
  fn parse_deps(&self) -> BTreeSet<BuildTarget> {
    self.declared_deps().clone()
  }

  fn as_any(&self) -> &dyn Any;
}

/// A target definition as written by the user.
///
/// ```json
/// { "target": "//app:hello", "kind": "binary", "command": ["echo", "hi"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTargetNode {
  pub target: String,
  pub kind: String,
  #[serde(flatten)]
  pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl RawTargetNode {
  pub fn new(target: &str, kind: &str) -> Self {
    Self {
      target: target.to_string(),
      kind: kind.to_string(),
      attributes: serde_json::Map::new(),
    }
  }

  pub fn with_attribute(mut self, name: &str, value: serde_json::Value) -> Self {
    self.attributes.insert(name.to_string(), value);
    self
  }

  pub fn parse_target(&self) -> Result<BuildTarget, ValidationError> {
    BuildTarget::parse(&self.target).map_err(|e| ValidationError::new(&self.target, "target", e.to_string()))
  }
}

/// Typed access to the attributes of one raw target.
///
/// Each attribute is deserialized on its own so errors always name the field.
/// A `null` attribute is treated as absent.
pub struct Attributes<'a> {
  target: &'a BuildTarget,
  attributes: &'a serde_json::Map<String, serde_json::Value>,
}

impl<'a> Attributes<'a> {
  pub fn new(target: &'a BuildTarget, attributes: &'a serde_json::Map<String, serde_json::Value>) -> Self {
    Self { target, attributes }
  }

  /// Reject any attribute not in `known`.
  pub fn deny_unknown(&self, known: &[&str]) -> Result<(), ValidationError> {
    match self.attributes.keys().find(|name| !known.contains(&name.as_str())) {
      Some(name) => Err(ValidationError::new(
        self.target,
        name,
        format!("unknown attribute, expected one of: {}", known.join(", ")),
      )),
      None => Ok(()),
    }
  }

  pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ValidationError> {
    match self.attributes.get(name) {
      None | Some(serde_json::Value::Null) => Ok(None),
      Some(value) => T::deserialize(value)
        .map(Some)
        .map_err(|e| ValidationError::new(self.target, name, e.to_string())),
    }
  }

  pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T, ValidationError> {
    self
      .optional(name)?
      .ok_or_else(|| ValidationError::missing(self.target, name))
  }

  pub fn or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, ValidationError> {
    Ok(self.optional(name)?.unwrap_or_default())
  }
}
