use std::path::PathBuf;

use thiserror::Error;

use crate::filesystem::ProjectFilesystem;
use crate::rule::BuildRuleResolver;
use crate::source_path::SourcePath;
use crate::target::BuildTarget;

/// A source path that could not be turned into a concrete location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcePathError {
  #[error("{0} is not a known rule")]
  UnknownRule(BuildTarget),

  #[error("{0} does not produce an output")]
  NoOutput(BuildTarget),
}

/// Turns [`SourcePath`]s into absolute locations.
///
/// Opaque to tools and rules: they only ever pass it through.
pub trait SourcePathResolver {
  fn absolute_path(&self, path: &SourcePath) -> Result<PathBuf, SourcePathError>;
}

/// Resolves project files against a project root and rule outputs through a
/// [`BuildRuleResolver`].
pub struct DefaultSourcePathResolver<'a> {
  rules: &'a BuildRuleResolver,
  filesystem: &'a ProjectFilesystem,
}

impl<'a> DefaultSourcePathResolver<'a> {
  pub fn new(rules: &'a BuildRuleResolver, filesystem: &'a ProjectFilesystem) -> Self {
    Self { rules, filesystem }
  }
}

impl SourcePathResolver for DefaultSourcePathResolver<'_> {
  fn absolute_path(&self, path: &SourcePath) -> Result<PathBuf, SourcePathError> {
    match path {
      SourcePath::Path(rel) => Ok(self.filesystem.resolve(rel)),
      SourcePath::BuildTarget(target) => {
        let rule = self
          .rules
          .get_rule(target)
          .ok_or_else(|| SourcePathError::UnknownRule(target.clone()))?;
        rule.output_path().ok_or_else(|| SourcePathError::NoOutput(target.clone()))
      }
    }
  }
}
