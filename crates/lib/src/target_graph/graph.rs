use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::args::{RawTargetNode, ValidationError};
use crate::description::DescriptionRegistry;
use crate::target::BuildTarget;

use super::node::TargetNode;

/// Errors building a [`TargetGraph`].
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("target {0} is defined more than once")]
  DuplicateTarget(BuildTarget),

  #[error("{target} depends on {dependency}, which is not defined")]
  MissingDependency { target: BuildTarget, dependency: BuildTarget },

  #[error("dependency cycle detected involving {0}")]
  Cycle(BuildTarget),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("invalid target definitions: {0}")]
  Json(#[from] serde_json::Error),
}

/// An acyclic graph of validated targets.
///
/// Edges run from a dependency to its dependents.
#[derive(Debug)]
pub struct TargetGraph {
  graph: DiGraph<BuildTarget, ()>,
  indices: HashMap<BuildTarget, NodeIndex>,
  nodes: BTreeMap<BuildTarget, TargetNode>,
  order: Vec<NodeIndex>,
}

impl TargetGraph {
  /// Build a graph from already-validated nodes.
  pub fn new(nodes: impl IntoIterator<Item = TargetNode>) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut indices = HashMap::new();
    let mut by_target = BTreeMap::new();

    for node in nodes {
      let target = node.target().clone();
      if by_target.contains_key(&target) {
        return Err(GraphError::DuplicateTarget(target));
      }
      indices.insert(target.clone(), graph.add_node(target.clone()));
      by_target.insert(target, node);
    }

    for (target, node) in &by_target {
      let dependent = indices[target];
      for dependency in node.deps() {
        let Some(&dep_idx) = indices.get(dependency) else {
          return Err(GraphError::MissingDependency {
            target: target.clone(),
            dependency: dependency.clone(),
          });
        };
        graph.add_edge(dep_idx, dependent, ());
      }
    }

    let order = toposort(&graph, None).map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].clone()))?;

    debug!(targets = by_target.len(), edges = graph.edge_count(), "built target graph");
    Ok(Self {
      graph,
      indices,
      nodes: by_target,
      order,
    })
  }

  /// Validate raw definitions through `registry` and build the graph.
  pub fn from_raw(raw: &[RawTargetNode], registry: &DescriptionRegistry) -> Result<Self, GraphError> {
    let nodes = raw
      .iter()
      .map(|raw| registry.parse_node(raw))
      .collect::<Result<Vec<_>, _>>()?;
    Self::new(nodes)
  }

  /// Parse a JSON array of raw definitions.
  pub fn from_json(json: &str, registry: &DescriptionRegistry) -> Result<Self, GraphError> {
    let raw: Vec<RawTargetNode> = serde_json::from_str(json)?;
    Self::from_raw(&raw, registry)
  }

  pub fn get(&self, target: &BuildTarget) -> Option<&TargetNode> {
    self.nodes.get(target)
  }

  /// Direct dependencies of `target`, sorted.
  pub fn deps_of(&self, target: &BuildTarget) -> Vec<&BuildTarget> {
    self
      .nodes
      .get(target)
      .map(|node| node.deps().iter().collect())
      .unwrap_or_default()
  }

  /// Targets that depend directly on `target`, sorted.
  pub fn dependents_of(&self, target: &BuildTarget) -> Vec<&BuildTarget> {
    let Some(&idx) = self.indices.get(target) else {
      return Vec::new();
    };
    let mut dependents: Vec<&BuildTarget> = self
      .graph
      .neighbors_directed(idx, Direction::Outgoing)
      .map(|dependent| &self.graph[dependent])
      .collect();
    dependents.sort();
    dependents
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// All nodes in target order.
  pub fn nodes(&self) -> impl Iterator<Item = &TargetNode> {
    self.nodes.values()
  }

  /// Targets ordered so that dependencies come before their dependents.
  pub fn topological_order(&self) -> Vec<&BuildTarget> {
    self.order.iter().map(|&idx| &self.graph[idx]).collect()
  }

  /// Targets grouped into waves.
  ///
  /// Every dependency of a target sits in an earlier wave, so the targets of
  /// one wave can be processed in parallel. Each wave is sorted.
  pub fn waves(&self) -> Vec<Vec<&BuildTarget>> {
    let mut level: HashMap<NodeIndex, usize> = HashMap::with_capacity(self.order.len());
    let mut waves: Vec<Vec<&BuildTarget>> = Vec::new();

    for &idx in &self.order {
      let node_level = self
        .graph
        .neighbors_directed(idx, Direction::Incoming)
        .map(|dep| level[&dep] + 1)
        .max()
        .unwrap_or(0);
      level.insert(idx, node_level);

      if waves.len() <= node_level {
        waves.resize_with(node_level + 1, Vec::new);
      }
      waves[node_level].push(&self.graph[idx]);
    }

    for wave in &mut waves {
      wave.sort();
    }
    waves
  }
}
