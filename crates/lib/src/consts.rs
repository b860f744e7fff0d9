//! Crate-wide constants.
//!
//! Anything in here that feeds into a rule key is part of the cache format:
//! changing it invalidates every previously computed key.

/// Version of the rule key encoding. Bump whenever [`crate::rulekey::RuleKeyBuilder`]
/// changes how values are written.
pub const RULE_KEY_FORMAT_VERSION: u32 = 1;

/// Reserved field holding the rule kind (e.g. `binary`).
pub const KIND_FIELD: &str = ".kind";

/// Reserved field holding the fully-qualified build target.
pub const TARGET_FIELD: &str = ".target";

/// Reserved field holding the keys of a rule's resolved build dependencies.
pub const DEPS_FIELD: &str = ".deps";

/// Directory, relative to the project root, where rule outputs are written.
pub const OUTPUT_DIR: &str = "rulekey-out";

/// Separator between the cell and the rest of a build target.
pub const CELL_SEPARATOR: &str = "//";

/// Environment variable overriding [`crate::config::EngineConfig::parallelism`].
pub const PARALLELISM_ENV: &str = "RULEKEY_PARALLELISM";

/// Environment variable overriding [`crate::config::EngineConfig::key_seed`].
pub const KEY_SEED_ENV: &str = "RULEKEY_SEED";
