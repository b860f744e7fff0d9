use std::sync::Arc;

use crate::args::{ConstructorArg, ValidationError};
use crate::filesystem::{CellPathResolver, ProjectFilesystem};
use crate::rule::{BuildRule, BuildRuleError, BuildRuleParams, BuildRuleResolver};
use crate::target::BuildTarget;
use crate::target_graph::TargetGraph;

/// Everything a description may consult while constructing a rule.
#[derive(Clone, Copy)]
pub struct BuildRuleCreationContext<'a> {
  pub target_graph: &'a TargetGraph,
  pub rule_resolver: &'a BuildRuleResolver,
  pub cell_roots: &'a CellPathResolver,
}

/// Factory for one rule kind.
///
/// Given equal arguments and equal resolved dependencies, a description must
/// produce rules with equal key fields.
pub trait Description: Send + Sync + 'static {
  type Arg: ConstructorArg;

  /// Name used for this kind in raw target definitions.
  fn kind(&self) -> &'static str;

  /// Name of the argument type this description accepts.
  fn arg_type(&self) -> &'static str {
    std::any::type_name::<Self::Arg>()
  }

  /// Validate the attributes of a raw target.
  fn parse_arg(
    &self,
    target: &BuildTarget,
    attributes: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<Self::Arg, ValidationError>;

  /// Construct the rule. `params` already holds the rules for every declared
  /// dependency; anything else the rule references must be looked up in
  /// `ctx.rule_resolver` and fail with
  /// [`BuildRuleError::UnresolvedDependency`] when absent.
  fn create_build_rule(
    &self,
    ctx: &BuildRuleCreationContext<'_>,
    target: &BuildTarget,
    filesystem: Arc<ProjectFilesystem>,
    params: BuildRuleParams,
    arg: &Self::Arg,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError>;
}

/// A [`Description`] with its argument type erased, as stored in the registry.
pub trait AnyDescription: Send + Sync {
  fn kind(&self) -> &'static str;

  fn arg_type(&self) -> &'static str;

  fn parse_arg(
    &self,
    target: &BuildTarget,
    attributes: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<Arc<dyn ConstructorArg>, ValidationError>;

  fn create_build_rule(
    &self,
    ctx: &BuildRuleCreationContext<'_>,
    target: &BuildTarget,
    filesystem: Arc<ProjectFilesystem>,
    params: BuildRuleParams,
    arg: &dyn ConstructorArg,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError>;
}

impl<D: Description> AnyDescription for D {
  fn kind(&self) -> &'static str {
    Description::kind(self)
  }

  fn arg_type(&self) -> &'static str {
    Description::arg_type(self)
  }

  fn parse_arg(
    &self,
    target: &BuildTarget,
    attributes: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<Arc<dyn ConstructorArg>, ValidationError> {
    let arg = Description::parse_arg(self, target, attributes)?;
    Ok(Arc::new(arg))
  }

  fn create_build_rule(
    &self,
    ctx: &BuildRuleCreationContext<'_>,
    target: &BuildTarget,
    filesystem: Arc<ProjectFilesystem>,
    params: BuildRuleParams,
    arg: &dyn ConstructorArg,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    let arg = arg
      .as_any()
      .downcast_ref::<D::Arg>()
      .ok_or_else(|| BuildRuleError::ArgTypeMismatch {
        target: target.clone(),
        kind: Description::kind(self).to_string(),
        expected: Description::arg_type(self),
      })?;
    Description::create_build_rule(self, ctx, target, filesystem, params, arg)
  }
}
