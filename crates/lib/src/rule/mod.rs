//! Constructed build rules.
//!
//! A [`BuildRule`] is what a [`Description`](crate::description::Description)
//! produces from a validated argument: it owns its resolved dependencies and
//! its project root, and lists the fields that feed its rule key. Rules never
//! execute themselves; an executor reads the command from the embedded
//! [`Tool`](crate::tool::Tool).
//!
//! Rules live in a [`BuildRuleResolver`], an arena indexed by [`BuildTarget`]
//! that is filled in dependency order.
//!
//! [`BuildTarget`]: crate::target::BuildTarget

mod resolver;
mod types;

pub use resolver::*;
pub use types::*;
