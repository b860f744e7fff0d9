//! Rule keys: deterministic digests over everything that can change a rule's
//! output.
//!
//! A rule lists its key-contributing fields as [`KeyField`]s in declaration
//! order. The [`RuleKeyFactory`] walks them, hashing each value by its
//! semantic kind:
//!
//! - scalars by their canonical encoding
//! - lists positionally, sets and maps in canonical order
//! - project files by relative path plus content hash
//! - rule outputs and rule references by the upstream rule's own key
//! - nested objects (tools) as if their fields were inline
//!
//! and finally folds in the keys of the rule's build dependencies. Keys are
//! memoized per build target, so diamond-shaped graphs compute each shared
//! dependency once.

mod builder;
mod factory;
mod file_hash;
mod types;

pub use builder::RuleKeyBuilder;
pub use factory::RuleKeyFactory;
pub use file_hash::{DefaultFileHashCache, FileHashCache, PrecomputedFileHashes};
pub use types::*;
