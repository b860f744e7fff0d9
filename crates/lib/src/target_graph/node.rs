use std::collections::BTreeSet;
use std::sync::Arc;

use crate::args::ConstructorArg;
use crate::target::BuildTarget;

/// A validated target: its kind, its argument, and the targets it depends on.
#[derive(Debug, Clone)]
pub struct TargetNode {
  target: BuildTarget,
  kind: String,
  arg: Arc<dyn ConstructorArg>,
  deps: BTreeSet<BuildTarget>,
}

impl TargetNode {
  pub fn new(target: BuildTarget, kind: &str, arg: Arc<dyn ConstructorArg>) -> Self {
    let deps = arg.parse_deps();
    Self {
      target,
      kind: kind.to_string(),
      arg,
      deps,
    }
  }

  pub fn target(&self) -> &BuildTarget {
    &self.target
  }

  pub fn kind(&self) -> &str {
    &self.kind
  }

  pub fn arg(&self) -> &dyn ConstructorArg {
    self.arg.as_ref()
  }

  /// The argument as its concrete type, if it is one.
  pub fn arg_as<T: ConstructorArg>(&self) -> Option<&T> {
    self.arg.as_any().downcast_ref::<T>()
  }

  /// Every target this node references; these are its graph edges.
  pub fn deps(&self) -> &BTreeSet<BuildTarget> {
    &self.deps
  }
}
