//! Test fixtures for rulekey-lib.
//!
//! A minimal rule whose key fields and dependencies are supplied directly, for
//! tests that exercise the resolver or the key engine without going through a
//! description.

use std::sync::Arc;

use crate::filesystem::ProjectFilesystem;
use crate::rule::BuildRule;
use crate::rulekey::{AddsToRuleKey, KeyField};
use crate::target::BuildTarget;

pub fn target(s: &str) -> BuildTarget {
  BuildTarget::parse(s).unwrap()
}

#[derive(Debug)]
pub struct FixedRule {
  pub target: BuildTarget,
  pub filesystem: Arc<ProjectFilesystem>,
  pub fields: Vec<KeyField>,
  pub deps: Vec<Arc<dyn BuildRule>>,
}

impl AddsToRuleKey for FixedRule {
  fn key_fields(&self) -> Vec<KeyField> {
    self.fields.clone()
  }
}

impl BuildRule for FixedRule {
  fn kind(&self) -> &str {
    "fixed"
  }

  fn build_target(&self) -> &BuildTarget {
    &self.target
  }

  fn filesystem(&self) -> &Arc<ProjectFilesystem> {
    &self.filesystem
  }

  fn build_deps(&self) -> &[Arc<dyn BuildRule>] {
    &self.deps
  }
}

/// A [`FixedRule`] rooted at `/project`.
pub fn fixed_rule(name: &str, fields: Vec<KeyField>, deps: Vec<Arc<dyn BuildRule>>) -> Arc<dyn BuildRule> {
  Arc::new(FixedRule {
    target: target(name),
    filesystem: ProjectFilesystem::new("/project"),
    fields,
    deps,
  })
}

/// A [`FixedRule`] with no fields and no deps.
pub fn leaf_rule(name: &str) -> Arc<dyn BuildRule> {
  fixed_rule(name, Vec::new(), Vec::new())
}
