//! Engine configuration.
//!
//! ```
//! use enstrend::config::{Config, DegeneratePolicy};
//!
//! let config = Config::default()
//!     .workers(4)
//!     .cache_bytes(64 * 1024 * 1024)
//!     .degenerate(DegeneratePolicy::Fail);
//! assert_eq!(config.workers, Some(4));
//! ```
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

/// The maximum chunk cache size in bytes. Will not hold less than one chunk.
pub const CACHE_SZ: u64 = 32 * 1024 * 1024;

/// What to do with a reduction that has no defined value (all weights zero, or no valid samples).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Write NaN and count the cell.
    #[default]
    Propagate,

    /// Fail the materialization with [`Error::UndefinedReduction`].
    Fail,
}

impl FromStr for DegeneratePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" | "nan" => Ok(DegeneratePolicy::Propagate),
            "fail" | "error" => Ok(DegeneratePolicy::Fail),
            other => Err(Error::Config(format!("unknown degenerate policy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of worker threads. `None` uses the rayon default (one per core).
    pub workers: Option<usize>,

    /// Budget for the per-materialization source chunk cache.
    pub cache_bytes: u64,

    pub degenerate: DegeneratePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: None,
            cache_bytes: CACHE_SZ,
            degenerate: DegeneratePolicy::default(),
        }
    }
}

impl Config {
    /// Read `ENSTREND_WORKERS`, `ENSTREND_CACHE_BYTES` and `ENSTREND_DEGENERATE` on top of the
    /// defaults.
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(w) = lookup("ENSTREND_WORKERS") {
            let w = w
                .trim()
                .parse::<usize>()
                .map_err(|e| Error::Config(format!("ENSTREND_WORKERS: {e}")))?;
            config.workers = if w == 0 { None } else { Some(w) };
        }

        if let Some(c) = lookup("ENSTREND_CACHE_BYTES") {
            config.cache_bytes = c
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("ENSTREND_CACHE_BYTES: {e}")))?;
        }

        if let Some(d) = lookup("ENSTREND_DEGENERATE") {
            config.degenerate = d.parse()?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    #[must_use]
    pub fn cache_bytes(mut self, bytes: u64) -> Self {
        self.cache_bytes = bytes;
        self
    }

    #[must_use]
    pub fn degenerate(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate = policy;
        self
    }
}
