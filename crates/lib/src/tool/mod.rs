//! Lazily-resolved command providers.
//!
//! A [`Tool`] describes a command line and environment without committing to
//! absolute paths: its [`SourcePath`]s are only turned into real locations when
//! an executor asks, through a [`SourcePathResolver`]. A tool also reports its
//! own key fields, so a rule embedding one picks up the tool's inputs and
//! dependencies without special-casing.

mod command;
mod resolver;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use command::*;
pub use resolver::*;

use crate::rulekey::{AddsToRuleKey, referenced_source_paths, referenced_targets};
use crate::source_path::SourcePath;
use crate::target::BuildTarget;

/// A command-line prefix plus environment, resolved on demand.
///
/// Both methods are pure functions of the tool's fields and the resolver.
pub trait Tool: AddsToRuleKey + fmt::Debug + Send + Sync {
  fn command_prefix(&self, resolver: &dyn SourcePathResolver) -> Result<Vec<String>, SourcePathError>;

  fn environment(&self, resolver: &dyn SourcePathResolver) -> Result<BTreeMap<String, String>, SourcePathError>;

  /// Targets this tool needs built before it can run.
  fn deps(&self) -> BTreeSet<BuildTarget> {
    referenced_targets(&self.key_fields())
  }

  /// Every input the tool references, hashed or not.
  fn inputs(&self) -> BTreeSet<SourcePath> {
    referenced_source_paths(&self.key_fields())
  }
}
