use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::args::ValidationError;
use crate::filesystem::ProjectFilesystem;
use crate::rulekey::AddsToRuleKey;
use crate::target::BuildTarget;
use crate::tool::{SourcePathError, Tool};

/// Errors raised while constructing a rule.
#[derive(Debug, Clone, Error)]
pub enum BuildRuleError {
  /// A dependency has not been materialised in the resolver yet.
  #[error("{target}: dependency {dependency} has not been built")]
  UnresolvedDependency { target: BuildTarget, dependency: BuildTarget },

  /// The argument was rejected while constructing the rule.
  #[error("{source}")]
  Validation { target: BuildTarget, source: ValidationError },

  /// A tool field could not be resolved to a concrete path.
  #[error("{target}: cannot resolve field '{field}': {source}")]
  ToolResolution {
    target: BuildTarget,
    field: String,
    source: SourcePathError,
  },

  /// A description was handed an argument of another kind.
  #[error("{target}: '{kind}' expects an argument of type {expected}")]
  ArgTypeMismatch {
    target: BuildTarget,
    kind: String,
    expected: &'static str,
  },

  #[error("rule {0} is already registered")]
  DuplicateRule(BuildTarget),

  #[error("{target}: unknown cell '{cell}'")]
  UnknownCell { target: BuildTarget, cell: String },
}

impl BuildRuleError {
  pub fn validation(target: &BuildTarget, source: ValidationError) -> Self {
    BuildRuleError::Validation {
      target: target.clone(),
      source,
    }
  }

  /// The rule whose construction failed.
  pub fn target(&self) -> &BuildTarget {
    match self {
      BuildRuleError::UnresolvedDependency { target, .. }
      | BuildRuleError::Validation { target, .. }
      | BuildRuleError::ToolResolution { target, .. }
      | BuildRuleError::ArgTypeMismatch { target, .. }
      | BuildRuleError::UnknownCell { target, .. }
      | BuildRuleError::DuplicateRule(target) => target,
    }
  }
}

/// A constructed, immutable build action.
///
/// Two rules with the same [`BuildTarget`] are the same rule within one build.
/// Rules are otherwise compared only through their rule keys.
pub trait BuildRule: AddsToRuleKey + fmt::Debug + Send + Sync {
  /// The rule kind, e.g. `binary`. Hashed into the key.
  fn kind(&self) -> &str;

  fn build_target(&self) -> &BuildTarget;

  fn filesystem(&self) -> &Arc<ProjectFilesystem>;

  /// Resolved dependencies, sorted by target.
  fn build_deps(&self) -> &[Arc<dyn BuildRule>];

  /// Where the rule writes its output, if it has one.
  fn output_path(&self) -> Option<PathBuf> {
    None
  }

  /// The command provider an executor runs for this rule.
  fn tool(&self) -> Option<&dyn Tool> {
    None
  }
}

/// Dependencies handed to a description when it constructs a rule.
#[derive(Debug, Clone, Default)]
pub struct BuildRuleParams {
  declared_deps: Vec<Arc<dyn BuildRule>>,
  extra_deps: Vec<Arc<dyn BuildRule>>,
}

impl BuildRuleParams {
  pub fn new(declared_deps: Vec<Arc<dyn BuildRule>>) -> Self {
    Self {
      declared_deps,
      extra_deps: Vec::new(),
    }
  }

  /// Add dependencies discovered outside the declared deps, e.g. through a tool.
  pub fn with_extra_deps(mut self, extra: impl IntoIterator<Item = Arc<dyn BuildRule>>) -> Self {
    self.extra_deps.extend(extra);
    self
  }

  pub fn declared_deps(&self) -> &[Arc<dyn BuildRule>] {
    &self.declared_deps
  }

  pub fn extra_deps(&self) -> &[Arc<dyn BuildRule>] {
    &self.extra_deps
  }

  /// Declared and extra deps, sorted by target with duplicates removed.
  pub fn build_deps(&self) -> Vec<Arc<dyn BuildRule>> {
    let mut deps: Vec<Arc<dyn BuildRule>> = self.declared_deps.iter().chain(&self.extra_deps).cloned().collect();
    deps.sort_by(|a, b| a.build_target().cmp(b.build_target()));
    deps.dedup_by(|a, b| a.build_target() == b.build_target());
    deps
  }
}
