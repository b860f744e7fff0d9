//! Materialising rules from a target graph.
//!
//! The [`ActionGraphBuilder`] walks a [`TargetGraph`] wave by wave: every
//! target in a wave has all of its dependencies in earlier waves, so the rules
//! of one wave are constructed in parallel against a resolver that already
//! holds everything they need. A target whose construction fails is recorded
//! and its dependents are skipped; unrelated targets carry on.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::description::{BuildRuleCreationContext, DescriptionRegistry};
use crate::filesystem::CellPathResolver;
use crate::rule::{BuildRuleError, BuildRuleResolver};
use crate::target::BuildTarget;
use crate::target_graph::{TargetGraph, TargetNode};

/// Outcome of walking a target graph.
#[derive(Debug, Default)]
pub struct ActionGraph {
  /// Every successfully constructed rule.
  pub resolver: BuildRuleResolver,

  /// Targets whose construction failed.
  pub failed: BTreeMap<BuildTarget, BuildRuleError>,

  /// Targets that were never constructed because a dependency failed.
  /// Maps the skipped target to the failed target that caused it.
  pub skipped: BTreeMap<BuildTarget, BuildTarget>,
}

impl ActionGraph {
  /// Returns true if every target was constructed.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  /// Number of targets processed, successful or not.
  pub fn total(&self) -> usize {
    self.resolver.len() + self.failed.len() + self.skipped.len()
  }

  /// The failed target responsible for `target` not being constructed.
  fn failed_root(&self, target: &BuildTarget) -> Option<BuildTarget> {
    if self.failed.contains_key(target) {
      Some(target.clone())
    } else {
      self.skipped.get(target).cloned()
    }
  }
}

/// Walks a target graph and constructs its rules.
pub struct ActionGraphBuilder<'a> {
  registry: &'a DescriptionRegistry,
  cell_roots: &'a CellPathResolver,
  config: EngineConfig,
}

impl<'a> ActionGraphBuilder<'a> {
  pub fn new(registry: &'a DescriptionRegistry, cell_roots: &'a CellPathResolver, config: &EngineConfig) -> Self {
    Self {
      registry,
      cell_roots,
      config: config.clone(),
    }
  }

  /// Construct every rule in `target_graph`.
  ///
  /// Never aborts early: each failure is confined to the failing target and
  /// the targets that depend on it.
  pub fn build(&self, target_graph: &TargetGraph) -> ActionGraph {
    info!(targets = target_graph.len(), parallelism = self.config.parallelism, "building action graph");
    let graph = self.build_waves(target_graph);
    info!(
      rules = graph.resolver.len(),
      failed = graph.failed.len(),
      skipped = graph.skipped.len(),
      "action graph built"
    );
    graph
  }

  fn build_waves(&self, target_graph: &TargetGraph) -> ActionGraph {
    let pool = self.config.thread_pool();
    let mut graph = ActionGraph::default();

    for wave in target_graph.waves() {
      let mut ready: Vec<&TargetNode> = Vec::with_capacity(wave.len());
      for target in wave {
        let Some(node) = target_graph.get(target) else {
          continue;
        };
        match node.deps().iter().find_map(|dep| graph.failed_root(dep)) {
          Some(root) => {
            warn!(target = %target, dependency = %root, "skipping target, dependency failed");
            graph.skipped.insert(target.clone(), root);
          }
          None => ready.push(node),
        }
      }

      let ctx = BuildRuleCreationContext {
        target_graph,
        rule_resolver: &graph.resolver,
        cell_roots: self.cell_roots,
      };
      let construct = || -> Vec<(BuildTarget, Result<(), BuildRuleError>)> {
        ready
          .par_iter()
          .map(|node| {
            let result = self
              .registry
              .create_build_rule(&ctx, node)
              .and_then(|rule| ctx.rule_resolver.add_to_index(rule))
              .map(|_| ());
            (node.target().clone(), result)
          })
          .collect()
      };
      let results = match &pool {
        Some(pool) => pool.install(construct),
        None => construct(),
      };

      for (target, result) in results {
        if let Err(e) = result {
          error!(target = %target, error = %e, "failed to create build rule");
          graph.failed.insert(target, e);
        }
      }
    }

    graph
  }
}
