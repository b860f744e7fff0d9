use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::args::{RawTargetNode, ValidationError};
use crate::rule::{BuildRule, BuildRuleError, BuildRuleParams};
use crate::target_graph::TargetNode;

use super::binary::BinaryDescription;
use super::export_file::ExportFileDescription;
use super::types::{AnyDescription, BuildRuleCreationContext, Description};

/// Descriptions indexed by rule kind.
#[derive(Default)]
pub struct DescriptionRegistry {
  descriptions: BTreeMap<&'static str, Arc<dyn AnyDescription>>,
}

impl fmt::Debug for DescriptionRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DescriptionRegistry")
      .field("kinds", &self.descriptions.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl DescriptionRegistry {
  /// An empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with every rule kind shipped in this crate.
  pub fn standard() -> Self {
    Self::new().with(BinaryDescription).with(ExportFileDescription)
  }

  /// Register `description`, replacing any previous one for the same kind.
  pub fn register<D: Description>(&mut self, description: D) -> &mut Self {
    let kind = Description::kind(&description);
    if self.descriptions.insert(kind, Arc::new(description)).is_some() {
      warn!(kind, "replaced existing description");
    }
    self
  }

  pub fn with<D: Description>(mut self, description: D) -> Self {
    self.register(description);
    self
  }

  pub fn get(&self, kind: &str) -> Option<&dyn AnyDescription> {
    self.descriptions.get(kind).map(|d| d.as_ref())
  }

  pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.descriptions.keys().copied()
  }

  /// Validate a raw definition into a target node.
  pub fn parse_node(&self, raw: &RawTargetNode) -> Result<TargetNode, ValidationError> {
    let target = raw.parse_target()?;
    let description = self.get(&raw.kind).ok_or_else(|| {
      ValidationError::new(
        &target,
        "kind",
        format!(
          "unknown rule kind '{}', expected one of: {}",
          raw.kind,
          self.kinds().collect::<Vec<_>>().join(", ")
        ),
      )
    })?;
    let arg = description.parse_arg(&target, &raw.attributes)?;
    Ok(TargetNode::new(target, description.kind(), arg))
  }

  /// Construct the rule for `node`.
  ///
  /// Declared dependencies are resolved through `ctx.rule_resolver` before the
  /// description runs; a dependency that has not been built yet is an error.
  pub fn create_build_rule(
    &self,
    ctx: &BuildRuleCreationContext<'_>,
    node: &TargetNode,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    let target = node.target();
    let description = self
      .get(node.kind())
      .ok_or_else(|| {
        let cause = ValidationError::new(target, "kind", format!("unknown rule kind '{}'", node.kind()));
        BuildRuleError::validation(target, cause)
      })?;

    let filesystem = ctx
      .cell_roots
      .cell(target.cell())
      .cloned()
      .ok_or_else(|| BuildRuleError::UnknownCell {
        target: target.clone(),
        cell: target.cell().to_string(),
      })?;

    let declared = ctx
      .rule_resolver
      .get_all_rules(target, node.arg().declared_deps())?;
    let params = BuildRuleParams::new(declared);

    let rule = description.create_build_rule(ctx, target, filesystem, params, node.arg())?;
    debug!(target = %target, kind = node.kind(), deps = rule.build_deps().len(), "created build rule");
    Ok(rule)
  }
}
