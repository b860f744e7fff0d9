//! rulekey-lib: build rule construction and rule keys
//!
//! This crate turns declarative target definitions into build rules and
//! computes a deterministic cache key for each of them:
//! - `TargetGraph`: validated targets and their dependency edges
//! - `Description`: per-kind factory from a validated argument to a `BuildRule`
//! - `BuildRule`: the constructed action, owning its resolved dependencies
//! - `Tool`: lazily-resolved command line and environment of a rule
//! - `RuleKey`: digest over everything that can affect a rule's output

pub mod action_graph;
pub mod args;
pub mod config;
pub mod consts;
pub mod description;
pub mod filesystem;
pub mod rule;
pub mod rulekey;
pub mod source_path;
pub mod target;
pub mod target_graph;
pub mod tool;
pub mod util;
