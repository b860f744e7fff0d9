//! Rule kinds.
//!
//! Each rule kind is a [`Description`]: it parses and validates the attributes
//! of a raw target into its own argument type, then constructs a
//! [`BuildRule`](crate::rule::BuildRule) from the validated argument and the
//! already-built rules it depends on. Kinds are looked up by name in a
//! [`DescriptionRegistry`]; the engine never branches on concrete kinds.
//!
//! Two kinds ship with the crate:
//!
//! - `binary`: runs a command with declared inputs and environment
//! - `export_file`: makes a source file available as a rule output

mod binary;
mod export_file;
mod registry;
mod types;

pub use binary::*;
pub use export_file::*;
pub use registry::*;
pub use types::*;
