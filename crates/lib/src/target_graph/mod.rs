//! The graph of validated targets.
//!
//! Built from raw definitions through a
//! [`DescriptionRegistry`](crate::description::DescriptionRegistry): every node
//! is parsed and validated up front, every dependency edge must point at a
//! defined target, and the graph must be acyclic. Rules are then materialised
//! in dependency waves by the [`action_graph`](crate::action_graph) walker.

mod graph;
mod node;

pub use graph::*;
pub use node::*;
