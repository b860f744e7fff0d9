use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::consts::{DEPS_FIELD, KIND_FIELD, TARGET_FIELD};
use crate::rule::{BuildRule, BuildRuleResolver};
use crate::source_path::SourcePath;
use crate::target::BuildTarget;

use super::builder::RuleKeyBuilder;
use super::file_hash::FileHashCache;
use super::types::{KeyFieldCause, KeyValue, RuleKey, RuleKeyError};

/// A field that could not be hashed, named by its dotted path.
struct FieldFailure {
  field: String,
  cause: KeyFieldCause,
}

impl FieldFailure {
  fn new(field: &str, cause: KeyFieldCause) -> Self {
    Self {
      field: field.to_string(),
      cause,
    }
  }
}

/// Memo entry for one target.
enum Slot {
  /// Being computed by the given thread.
  Running(ThreadId),
  Done(Result<RuleKey, RuleKeyError>),
}

#[derive(Default)]
struct Memo {
  slots: HashMap<BuildTarget, Slot>,
  /// Target each blocked thread is waiting for.
  waiting: HashMap<ThreadId, BuildTarget>,
}

impl Memo {
  /// Whether `owner` is, directly or through other waiting threads, blocked
  /// on `me`. Waiting for `owner` would then never finish.
  fn waits_on(&self, mut owner: ThreadId, me: ThreadId) -> bool {
    loop {
      if owner == me {
        return true;
      }
      let Some(next) = self.waiting.get(&owner) else {
        return false;
      };
      match self.slots.get(next) {
        Some(Slot::Running(next_owner)) => owner = *next_owner,
        _ => return false,
      }
    }
  }
}

enum Claim {
  Done(Result<RuleKey, RuleKeyError>),
  Compute,
  Cycle,
}

/// Releases a claimed slot if its computation unwinds, so waiters retry
/// instead of blocking forever.
struct ClaimGuard<'f, 'a> {
  factory: &'f RuleKeyFactory<'a>,
  target: &'f BuildTarget,
  finished: bool,
}

impl Drop for ClaimGuard<'_, '_> {
  fn drop(&mut self) {
    if self.finished {
      return;
    }
    if let Ok(mut memo) = self.factory.memo.lock() {
      memo.slots.remove(self.target);
    }
    self.factory.ready.notify_all();
  }
}

/// Computes and memoizes rule keys for one build.
///
/// Dependencies referenced from fields or from a rule's build deps are looked
/// up in the [`BuildRuleResolver`]; a reference the resolver does not know is
/// an error, never skipped. Results, failures included, are memoized by
/// [`BuildTarget`] for the life of the factory, so a factory must not outlive
/// the build graph it was given.
///
/// Each target is computed at most once even when many threads ask for it:
/// the first caller computes, later callers block until its result is ready.
/// A thread that would end up waiting on itself reports a cycle instead.
pub struct RuleKeyFactory<'a> {
  rules: &'a BuildRuleResolver,
  file_hashes: &'a dyn FileHashCache,
  config: EngineConfig,
  memo: Mutex<Memo>,
  ready: Condvar,
  computed: AtomicUsize,
}

impl<'a> RuleKeyFactory<'a> {
  pub fn new(rules: &'a BuildRuleResolver, file_hashes: &'a dyn FileHashCache, config: &EngineConfig) -> Self {
    Self {
      rules,
      file_hashes,
      config: config.clone(),
      memo: Mutex::new(Memo::default()),
      ready: Condvar::new(),
      computed: AtomicUsize::new(0),
    }
  }

  /// Key of `rule`, computing any missing dependency keys on the way.
  pub fn build(&self, rule: &dyn BuildRule) -> Result<RuleKey, RuleKeyError> {
    let target = rule.build_target();
    match self.claim(target) {
      Claim::Done(result) => result,
      Claim::Compute => self.compute(rule),
      // Only reachable when called from inside another key computation.
      Claim::Cycle => Err(RuleKeyError::Field {
        target: target.clone(),
        field: DEPS_FIELD.to_string(),
        cause: KeyFieldCause::Cycle(target.clone()),
      }),
    }
  }

  /// Key of the rule registered for `target`.
  pub fn build_for_target(&self, target: &BuildTarget) -> Result<RuleKey, RuleKeyError> {
    let rule = self
      .rules
      .get_rule(target)
      .ok_or_else(|| RuleKeyError::MissingRule(target.clone()))?;
    self.build(rule.as_ref())
  }

  /// Keys for many targets, computed in parallel.
  ///
  /// Each target gets its own result; one failing key never affects another.
  pub fn build_all(&self, targets: &[BuildTarget]) -> BTreeMap<BuildTarget, Result<RuleKey, RuleKeyError>> {
    let results: BTreeMap<_, _> = self.config.install(|| {
      targets
        .par_iter()
        .map(|target| (target.clone(), self.build_for_target(target)))
        .collect()
    });

    let failed = results.values().filter(|r| r.is_err()).count();
    if failed > 0 {
      warn!(total = results.len(), failed, "rule key computation failed for some targets");
    } else {
      info!(total = results.len(), computed = self.computed_count(), "computed rule keys");
    }
    results
  }

  /// Previously computed key for `target`, if any. Failed keys are `None`.
  pub fn cached(&self, target: &BuildTarget) -> Option<RuleKey> {
    match self.memo.lock().expect("rule key memo lock poisoned").slots.get(target) {
      Some(Slot::Done(Ok(key))) => Some(*key),
      _ => None,
    }
  }

  /// Number of key computations this factory has run, failed ones included.
  pub fn computed_count(&self) -> usize {
    self.computed.load(Ordering::Relaxed)
  }

  /// Take ownership of computing `target`, or wait for whoever has it.
  fn claim(&self, target: &BuildTarget) -> Claim {
    let me = thread::current().id();
    let mut memo = self.memo.lock().expect("rule key memo lock poisoned");
    loop {
      match memo.slots.get(target) {
        None => {
          memo.slots.insert(target.clone(), Slot::Running(me));
          return Claim::Compute;
        }
        Some(Slot::Done(result)) => return Claim::Done(result.clone()),
        Some(Slot::Running(owner)) => {
          let owner = *owner;
          if memo.waits_on(owner, me) {
            return Claim::Cycle;
          }
          memo.waiting.insert(me, target.clone());
          memo = self.ready.wait(memo).expect("rule key memo lock poisoned");
          memo.waiting.remove(&me);
        }
      }
    }
  }

  /// Compute the key of a rule whose slot this thread has claimed.
  fn compute(&self, rule: &dyn BuildRule) -> Result<RuleKey, RuleKeyError> {
    let target = rule.build_target();
    let mut guard = ClaimGuard {
      factory: self,
      target,
      finished: false,
    };

    let result = self.compute_uncached(rule);
    self.computed.fetch_add(1, Ordering::Relaxed);
    match &result {
      Ok(key) => debug!(target = %target, key = %key, "computed rule key"),
      Err(e) => debug!(target = %target, error = %e, "rule key failed"),
    }

    self
      .memo
      .lock()
      .expect("rule key memo lock poisoned")
      .slots
      .insert(target.clone(), Slot::Done(result.clone()));
    guard.finished = true;
    self.ready.notify_all();
    result
  }

  fn compute_uncached(&self, rule: &dyn BuildRule) -> Result<RuleKey, RuleKeyError> {
    let target = rule.build_target();
    let fail = |failure: FieldFailure| {
      debug!(target = %target, field = %failure.field, error = %failure.cause, "rule key field failed");
      RuleKeyError::Field {
        target: target.clone(),
        field: failure.field,
        cause: failure.cause,
      }
    };

    let mut builder = RuleKeyBuilder::new(&self.config.key_seed);
    builder.field_name(KIND_FIELD).string(rule.kind());
    builder.field_name(TARGET_FIELD).string(target.fully_qualified_name());

    for field in rule.key_fields() {
      builder.field_name(field.name);
      self
        .write_value(&mut builder, rule, field.name, &field.value)
        .map_err(fail)?;
    }

    let deps = rule.build_deps();
    builder.field_name(DEPS_FIELD).begin_set(deps.len());
    for dep in deps {
      let dep_target = dep.build_target();
      let key = self
        .dep_key(dep_target)
        .map_err(|cause| fail(FieldFailure::new(DEPS_FIELD, cause)))?;
      builder.rule(dep_target, &key);
    }

    Ok(builder.build())
  }

  fn write_value(
    &self,
    builder: &mut RuleKeyBuilder,
    rule: &dyn BuildRule,
    field: &str,
    value: &KeyValue,
  ) -> Result<(), FieldFailure> {
    match value {
      KeyValue::Null => {
        builder.null();
      }
      KeyValue::Bool(v) => {
        builder.bool(*v);
      }
      KeyValue::Int(v) => {
        builder.int(*v);
      }
      KeyValue::String(s) => {
        builder.string(s);
      }
      KeyValue::List(items) => {
        builder.begin_list(items.len());
        for item in items {
          self.write_value(builder, rule, field, item)?;
        }
      }
      KeyValue::Set(items) => {
        builder.begin_set(items.len());
        for item in items {
          self.write_value(builder, rule, field, item)?;
        }
      }
      KeyValue::Map(entries) => {
        builder.begin_map(entries.len());
        for (key, item) in entries {
          builder.map_key(key);
          self.write_value(builder, rule, field, item)?;
        }
      }
      KeyValue::SourcePath(SourcePath::Path(rel)) => {
        let absolute = rule.filesystem().resolve(rel);
        let hash = self
          .file_hashes
          .get(&absolute)
          .map_err(|e| FieldFailure::new(field, e.into()))?;
        builder.path(rel, &hash);
      }
      KeyValue::SourcePath(SourcePath::BuildTarget(target)) | KeyValue::Rule(target) => {
        let key = self
          .dep_key(target)
          .map_err(|cause| FieldFailure::new(field, cause))?;
        builder.rule(target, &key);
      }
      KeyValue::NonHashedSourcePath(_) => {
        builder.non_hashed_path();
      }
      KeyValue::Nested(fields) => {
        builder.begin_nested(fields.len());
        for nested in fields {
          let path = format!("{field}.{}", nested.name);
          builder.field_name(nested.name);
          self.write_value(builder, rule, &path, &nested.value)?;
        }
      }
    }
    Ok(())
  }

  fn dep_key(&self, target: &BuildTarget) -> Result<RuleKey, KeyFieldCause> {
    let result = match self.claim(target) {
      Claim::Done(result) => result,
      Claim::Cycle => return Err(KeyFieldCause::Cycle(target.clone())),
      Claim::Compute => match self.rules.get_rule(target) {
        Some(rule) => self.compute(rule.as_ref()),
        None => {
          self.release(target);
          return Err(KeyFieldCause::UnresolvedTarget(target.clone()));
        }
      },
    };
    result.map_err(|e| KeyFieldCause::Dependency(Box::new(e)))
  }

  /// Give up a claimed slot without a result.
  fn release(&self, target: &BuildTarget) {
    self
      .memo
      .lock()
      .expect("rule key memo lock poisoned")
      .slots
      .remove(target);
    self.ready.notify_all();
  }
}
