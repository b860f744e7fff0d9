//! Build target identifiers.
//!
//! A [`BuildTarget`] names exactly one buildable unit: `cell//base/path:name`.
//! Targets are plain values; two targets are the same rule if and only if their
//! fully-qualified names are equal.

mod types;

pub use types::*;
