//! Low-level rule key encoder.
//!
//! Every value is written as a one-byte tag followed by its content; strings
//! and collections are length-prefixed with a little-endian `u64`. The tag
//! bytes and layout are part of the cache format, see
//! [`RULE_KEY_FORMAT_VERSION`].

use sha2::{Digest, Sha256};

use crate::consts::RULE_KEY_FORMAT_VERSION;
use crate::source_path::RelPath;
use crate::target::BuildTarget;
use crate::util::hash::ContentHash;

use super::types::{RULE_KEY_LEN, RuleKey};

mod tag {
  pub const FIELD: u8 = b'F';
  pub const NULL: u8 = b'0';
  pub const BOOL: u8 = b'b';
  pub const INT: u8 = b'i';
  pub const STRING: u8 = b's';
  pub const LIST: u8 = b'l';
  pub const SET: u8 = b'S';
  pub const MAP: u8 = b'm';
  pub const PATH: u8 = b'p';
  pub const NON_HASHED_PATH: u8 = b'x';
  pub const RULE: u8 = b'r';
  pub const NESTED: u8 = b'n';
}

/// Streaming encoder producing a [`RuleKey`].
///
/// The builder knows nothing about rules; callers walk the fields and feed it
/// primitives in a fixed order.
pub struct RuleKeyBuilder {
  hasher: Sha256,
}

impl RuleKeyBuilder {
  /// Start a key. The format version and `seed` are written before anything else.
  pub fn new(seed: &str) -> Self {
    let mut builder = Self { hasher: Sha256::new() };
    builder.hasher.update(RULE_KEY_FORMAT_VERSION.to_le_bytes());
    builder.raw_str(seed);
    builder
  }

  fn raw_len(&mut self, len: usize) {
    self.hasher.update((len as u64).to_le_bytes());
  }

  fn raw_str(&mut self, value: &str) {
    self.raw_len(value.len());
    self.hasher.update(value.as_bytes());
  }

  fn tag(&mut self, tag: u8) -> &mut Self {
    self.hasher.update([tag]);
    self
  }

  /// Begin a named field; the value must follow immediately.
  pub fn field_name(&mut self, name: &str) -> &mut Self {
    self.tag(tag::FIELD).raw_str(name);
    self
  }

  pub fn null(&mut self) -> &mut Self {
    self.tag(tag::NULL)
  }

  pub fn bool(&mut self, value: bool) -> &mut Self {
    self.tag(tag::BOOL);
    self.hasher.update([u8::from(value)]);
    self
  }

  pub fn int(&mut self, value: i64) -> &mut Self {
    self.tag(tag::INT);
    self.hasher.update(value.to_le_bytes());
    self
  }

  pub fn string(&mut self, value: &str) -> &mut Self {
    self.tag(tag::STRING).raw_str(value);
    self
  }

  /// Begin an ordered sequence of `len` values.
  pub fn begin_list(&mut self, len: usize) -> &mut Self {
    self.tag(tag::LIST).raw_len(len);
    self
  }

  /// Begin a set of `len` values; the caller writes them in canonical order.
  pub fn begin_set(&mut self, len: usize) -> &mut Self {
    self.tag(tag::SET).raw_len(len);
    self
  }

  /// Begin a map of `len` entries; each entry is a [`Self::map_key`] then a value.
  pub fn begin_map(&mut self, len: usize) -> &mut Self {
    self.tag(tag::MAP).raw_len(len);
    self
  }

  pub fn map_key(&mut self, key: &str) -> &mut Self {
    self.raw_str(key);
    self
  }

  /// Begin `len` nested fields.
  pub fn begin_nested(&mut self, len: usize) -> &mut Self {
    self.tag(tag::NESTED).raw_len(len);
    self
  }

  /// A project file: its relative path and the hash of its contents.
  pub fn path(&mut self, path: &RelPath, content: &ContentHash) -> &mut Self {
    self.tag(tag::PATH).raw_str(path.as_str());
    self.raw_str(&content.0);
    self
  }

  /// Placeholder for a dependency-only source path.
  pub fn non_hashed_path(&mut self) -> &mut Self {
    self.tag(tag::NON_HASHED_PATH)
  }

  /// Another rule, identified by target and folded in through its key.
  pub fn rule(&mut self, target: &BuildTarget, key: &RuleKey) -> &mut Self {
    self.tag(tag::RULE).raw_str(target.fully_qualified_name());
    self.hasher.update(key.as_bytes());
    self
  }

  pub fn build(self) -> RuleKey {
    let digest = self.hasher.finalize();
    let mut bytes = [0u8; RULE_KEY_LEN];
    bytes.copy_from_slice(&digest);
    RuleKey::from_bytes(bytes)
  }
}
