//! Typed build-target arguments.
//!
//! A raw target definition is a bag of JSON attributes tagged with a rule
//! kind. The matching [`crate::description::Description`] turns those
//! attributes into an immutable, validated argument value; validation errors
//! surface here, before any rule is constructed.

mod types;

pub use types::*;
