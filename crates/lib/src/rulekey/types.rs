use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source_path::SourcePath;
use crate::target::BuildTarget;
use crate::util::hash::FileHashError;

/// Size in bytes of a [`RuleKey`].
pub const RULE_KEY_LEN: usize = 32;

/// Deterministic digest over everything that can affect a rule's output.
///
/// Equal keys mean two rule configurations are interchangeable for caching.
/// Serialized as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleKey([u8; RULE_KEY_LEN]);

impl RuleKey {
  pub fn from_bytes(bytes: [u8; RULE_KEY_LEN]) -> Self {
    Self(bytes)
  }

  pub fn as_bytes(&self) -> &[u8; RULE_KEY_LEN] {
    &self.0
  }

  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }
}

impl fmt::Display for RuleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for RuleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "RuleKey({})", self.to_hex())
  }
}

impl FromStr for RuleKey {
  type Err = hex::FromHexError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut bytes = [0u8; RULE_KEY_LEN];
    hex::decode_to_slice(s, &mut bytes)?;
    Ok(Self(bytes))
  }
}

impl TryFrom<String> for RuleKey {
  type Error = hex::FromHexError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<RuleKey> for String {
  fn from(key: RuleKey) -> Self {
    key.to_hex()
  }
}

/// The semantic content of a key-contributing field.
///
/// Each variant has its own hashing rule: lists are positional, sets and maps
/// are canonical (their order comes from the collection, never from how they
/// were built), source paths hash file contents or upstream keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
  Null,
  Bool(bool),
  Int(i64),
  String(String),
  List(Vec<KeyValue>),
  Set(BTreeSet<KeyValue>),
  Map(BTreeMap<String, KeyValue>),
  /// An input whose content (or upstream key) participates in the key.
  SourcePath(SourcePath),
  /// An input that only surfaces a dependency; it adds no content to the key.
  NonHashedSourcePath(SourcePath),
  /// A reference to another rule; contributes that rule's key.
  Rule(BuildTarget),
  /// The fields of an embedded object such as a [`crate::tool::Tool`].
  Nested(Vec<KeyField>),
}

impl KeyValue {
  /// Fields of an embedded object, hashed as if inline under the owning field.
  pub fn nested(value: &impl AddsToRuleKey) -> Self {
    KeyValue::Nested(value.key_fields())
  }

  pub fn list<T: Into<KeyValue>>(items: impl IntoIterator<Item = T>) -> Self {
    KeyValue::List(items.into_iter().map(Into::into).collect())
  }

  pub fn set<T: Into<KeyValue>>(items: impl IntoIterator<Item = T>) -> Self {
    KeyValue::Set(items.into_iter().map(Into::into).collect())
  }

  pub fn map<K: Into<String>, V: Into<KeyValue>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
    KeyValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }

  /// Dependency-only references, see [`KeyValue::NonHashedSourcePath`].
  pub fn non_hashed<'a>(paths: impl IntoIterator<Item = &'a SourcePath>) -> Self {
    KeyValue::List(paths.into_iter().cloned().map(KeyValue::NonHashedSourcePath).collect())
  }

  /// Walk every source path reachable from this value.
  pub fn visit_source_paths<'a>(&'a self, f: &mut impl FnMut(&'a SourcePath)) {
    match self {
      KeyValue::SourcePath(path) | KeyValue::NonHashedSourcePath(path) => f(path),
      KeyValue::List(items) => items.iter().for_each(|item| item.visit_source_paths(f)),
      KeyValue::Set(items) => items.iter().for_each(|item| item.visit_source_paths(f)),
      KeyValue::Map(entries) => entries.values().for_each(|item| item.visit_source_paths(f)),
      KeyValue::Nested(fields) => fields.iter().for_each(|field| field.value.visit_source_paths(f)),
      KeyValue::Null | KeyValue::Bool(_) | KeyValue::Int(_) | KeyValue::String(_) | KeyValue::Rule(_) => {}
    }
  }

  /// Walk every build target reachable from this value, whether referenced
  /// directly or as a rule-output source path.
  pub fn visit_build_targets<'a>(&'a self, f: &mut impl FnMut(&'a BuildTarget)) {
    match self {
      KeyValue::Rule(target) => f(target),
      KeyValue::SourcePath(SourcePath::BuildTarget(target))
      | KeyValue::NonHashedSourcePath(SourcePath::BuildTarget(target)) => f(target),
      KeyValue::List(items) => items.iter().for_each(|item| item.visit_build_targets(f)),
      KeyValue::Set(items) => items.iter().for_each(|item| item.visit_build_targets(f)),
      KeyValue::Map(entries) => entries.values().for_each(|item| item.visit_build_targets(f)),
      KeyValue::Nested(fields) => fields.iter().for_each(|field| field.value.visit_build_targets(f)),
      KeyValue::SourcePath(SourcePath::Path(_))
      | KeyValue::NonHashedSourcePath(SourcePath::Path(_))
      | KeyValue::Null
      | KeyValue::Bool(_)
      | KeyValue::Int(_)
      | KeyValue::String(_) => {}
    }
  }
}

impl From<&str> for KeyValue {
  fn from(value: &str) -> Self {
    KeyValue::String(value.to_string())
  }
}

impl From<String> for KeyValue {
  fn from(value: String) -> Self {
    KeyValue::String(value)
  }
}

impl From<&String> for KeyValue {
  fn from(value: &String) -> Self {
    KeyValue::String(value.clone())
  }
}

impl From<bool> for KeyValue {
  fn from(value: bool) -> Self {
    KeyValue::Bool(value)
  }
}

impl From<i64> for KeyValue {
  fn from(value: i64) -> Self {
    KeyValue::Int(value)
  }
}

impl From<SourcePath> for KeyValue {
  fn from(value: SourcePath) -> Self {
    KeyValue::SourcePath(value)
  }
}

impl From<&SourcePath> for KeyValue {
  fn from(value: &SourcePath) -> Self {
    KeyValue::SourcePath(value.clone())
  }
}

impl From<BuildTarget> for KeyValue {
  fn from(value: BuildTarget) -> Self {
    KeyValue::Rule(value)
  }
}

impl From<&BuildTarget> for KeyValue {
  fn from(value: &BuildTarget) -> Self {
    KeyValue::Rule(value.clone())
  }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
  fn from(value: Option<T>) -> Self {
    value.map_or(KeyValue::Null, Into::into)
  }
}

/// A named key-contributing field.
///
/// The name is hashed together with the value so two fields holding the same
/// value under different names never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyField {
  pub name: &'static str,
  pub value: KeyValue,
}

impl KeyField {
  pub fn new(name: &'static str, value: impl Into<KeyValue>) -> Self {
    Self {
      name,
      value: value.into(),
    }
  }
}

/// Types whose configuration feeds into a rule key.
///
/// Implementations list their fields in a fixed declaration order; that order
/// is part of the cache format.
pub trait AddsToRuleKey {
  fn key_fields(&self) -> Vec<KeyField>;
}

/// Every build target referenced from `fields`, sorted.
pub fn referenced_targets(fields: &[KeyField]) -> BTreeSet<BuildTarget> {
  let mut targets = BTreeSet::new();
  for field in fields {
    field.value.visit_build_targets(&mut |target| {
      targets.insert(target.clone());
    });
  }
  targets
}

/// Every source path referenced from `fields`, sorted.
pub fn referenced_source_paths(fields: &[KeyField]) -> BTreeSet<SourcePath> {
  let mut paths = BTreeSet::new();
  for field in fields {
    field.value.visit_source_paths(&mut |path| {
      paths.insert(path.clone());
    });
  }
  paths
}

/// Why a single field could not be hashed.
#[derive(Debug, Clone, Error)]
pub enum KeyFieldCause {
  #[error("{0}")]
  FileHash(#[from] FileHashError),

  #[error("{0} is not resolvable in the current build graph")]
  UnresolvedTarget(BuildTarget),

  #[error("dependency cycle through {0}")]
  Cycle(BuildTarget),

  #[error("{0}")]
  Dependency(Box<RuleKeyError>),
}

/// Errors from rule key computation.
///
/// A failed key is never replaced by a default; the error names the rule and
/// the field that could not be hashed.
#[derive(Debug, Clone, Error)]
pub enum RuleKeyError {
  #[error("no rule for {0}")]
  MissingRule(BuildTarget),

  #[error("key computation failed for field '{field}' of rule {target}: {cause}")]
  Field {
    target: BuildTarget,
    field: String,
    cause: KeyFieldCause,
  },
}

impl RuleKeyError {
  /// The rule whose key could not be computed.
  pub fn target(&self) -> &BuildTarget {
    match self {
      RuleKeyError::MissingRule(target) => target,
      RuleKeyError::Field { target, .. } => target,
    }
  }

  /// The innermost error in a chain of failed dependency keys.
  pub fn root_cause(&self) -> &RuleKeyError {
    match self {
      RuleKeyError::Field {
        cause: KeyFieldCause::Dependency(inner),
        ..
      } => inner.root_cause(),
      other => other,
    }
  }
}
