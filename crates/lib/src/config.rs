//! Engine configuration.
//!
//! Defaults suit an interactive build; the environment can override them
//! without touching code (see [`EngineConfig::from_env`]).

use std::env;

use thiserror::Error;
use tracing::warn;

use crate::consts::{KEY_SEED_ENV, PARALLELISM_ENV};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("invalid value '{value}' for {var}: {message}")]
  InvalidValue {
    var: &'static str,
    value: String,
    message: String,
  },
}

/// Configuration for rule construction and key computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Maximum number of rules constructed or keyed concurrently.
  pub parallelism: usize,

  /// Folded into every rule key before any field. Changing it invalidates
  /// every previously computed key.
  pub key_seed: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      key_seed: String::new(),
    }
  }
}

impl EngineConfig {
  /// Defaults, overridden by `RULEKEY_PARALLELISM` and `RULEKEY_SEED` when set.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Ok(value) = env::var(PARALLELISM_ENV) {
      config.parallelism = match value.trim().parse::<usize>() {
        Ok(0) => {
          return Err(ConfigError::InvalidValue {
            var: PARALLELISM_ENV,
            value,
            message: "must be at least 1".to_string(),
          });
        }
        Ok(n) => n,
        Err(e) => {
          return Err(ConfigError::InvalidValue {
            var: PARALLELISM_ENV,
            value,
            message: e.to_string(),
          });
        }
      };
    }

    if let Ok(seed) = env::var(KEY_SEED_ENV) {
      config.key_seed = seed;
    }

    Ok(config)
  }

  /// A thread pool sized to [`Self::parallelism`], or `None` (with a warning)
  /// if one cannot be created.
  pub fn thread_pool(&self) -> Option<rayon::ThreadPool> {
    match rayon::ThreadPoolBuilder::new()
      .num_threads(self.parallelism.max(1))
      .build()
    {
      Ok(pool) => Some(pool),
      Err(e) => {
        warn!(error = %e, "could not create thread pool, using the global pool");
        None
      }
    }
  }

  /// Run `op` on a pool from [`Self::thread_pool`], falling back to the global
  /// pool. Parallel iterators inside `op` use that pool.
  pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
    match self.thread_pool() {
      Some(pool) => pool.install(op),
      None => op(),
    }
  }
}

fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
