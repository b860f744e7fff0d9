use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::target::BuildTarget;

use super::{BuildRule, BuildRuleError};

/// Arena of constructed rules, indexed by target.
///
/// Populated in dependency order by the graph walker; descriptions read from it
/// to resolve declared dependencies. Shared across threads during a parallel
/// walk.
#[derive(Debug, Default)]
pub struct BuildRuleResolver {
  rules: RwLock<BTreeMap<BuildTarget, Arc<dyn BuildRule>>>,
}

impl BuildRuleResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a rule. Each target may be registered once.
  pub fn add_to_index(&self, rule: Arc<dyn BuildRule>) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    let mut rules = self.rules.write().expect("rule resolver lock poisoned");
    let target = rule.build_target().clone();
    if rules.contains_key(&target) {
      return Err(BuildRuleError::DuplicateRule(target));
    }
    debug!(target = %target, kind = rule.kind(), "indexed rule");
    rules.insert(target, rule.clone());
    Ok(rule)
  }

  pub fn get_rule(&self, target: &BuildTarget) -> Option<Arc<dyn BuildRule>> {
    self.rules.read().expect("rule resolver lock poisoned").get(target).cloned()
  }

  /// Look up `dependency` on behalf of `target`.
  pub fn require_rule(&self, target: &BuildTarget, dependency: &BuildTarget) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    self
      .get_rule(dependency)
      .ok_or_else(|| BuildRuleError::UnresolvedDependency {
        target: target.clone(),
        dependency: dependency.clone(),
      })
  }

  /// Every rule in `dependencies`, in target order.
  ///
  /// Fails on the first dependency that has not been registered yet.
  pub fn get_all_rules(
    &self,
    target: &BuildTarget,
    dependencies: &BTreeSet<BuildTarget>,
  ) -> Result<Vec<Arc<dyn BuildRule>>, BuildRuleError> {
    let rules = self.rules.read().expect("rule resolver lock poisoned");
    dependencies
      .iter()
      .map(|dependency| {
        rules
          .get(dependency)
          .cloned()
          .ok_or_else(|| BuildRuleError::UnresolvedDependency {
            target: target.clone(),
            dependency: dependency.clone(),
          })
      })
      .collect()
  }

  pub fn contains(&self, target: &BuildTarget) -> bool {
    self.rules.read().expect("rule resolver lock poisoned").contains_key(target)
  }

  pub fn len(&self) -> usize {
    self.rules.read().expect("rule resolver lock poisoned").len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Registered targets in sorted order.
  pub fn targets(&self) -> Vec<BuildTarget> {
    self.rules.read().expect("rule resolver lock poisoned").keys().cloned().collect()
  }
}
