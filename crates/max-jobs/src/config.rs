use std::collections::HashMap;
use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_JOBS_KEY: &str = "MAX_JOBS";
const MAX_JOBS_JITTER_KEY: &str = "MAX_JOBS_JITTER";
const MAX_JOBS_RUNTIME_KEY: &str = "MAX_JOBS_RUNTIME";
const MAX_JOBS_RUNTIME_JITTER_KEY: &str = "MAX_JOBS_RUNTIME_JITTER";

/// Fallback when `MAX_JOBS` is unset.
const DEFAULT_MAX_JOBS: i64 = 500;

/// A negative quota or jitter bound is disabled.
const DISABLED: i64 = -1;

/// Counting domain a quota and its counter apply to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every job, regardless of queue.
    Global,
    /// Jobs pulled from one queue. Holds the case-normalized name.
    Queue(String),
}

impl Scope {
    /// Queue scope with the name normalized the way configuration keys are.
    pub fn queue(name: &str) -> Self {
        Scope::Queue(name.to_uppercase())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Queue(name) => write!(f, "queue:{}", name),
        }
    }
}

/// Immutable snapshot of every recognized `MAX_JOBS*` option.
///
/// Built once at process startup and shared by reference for the process
/// lifetime; quotas resolved from it never change underneath the tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaSettings {
    values: HashMap<String, i64>,
}

impl QuotaSettings {
    /// Snapshot the recognized keys from the process environment.
    ///
    /// Fails on the first value that does not parse as an integer: a quota
    /// silently replaced by a default is a worse outcome than an error at
    /// boot. Unrecognized environment variables are ignored.
    pub fn from_env() -> Result<Self> {
        Self::from_pairs(env::vars())
    }

    /// Build a snapshot from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = HashMap::new();
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            if !Self::recognized(key) {
                continue;
            }
            let parsed = value.trim().parse::<i64>().map_err(|_| Error::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            values.insert(key.to_string(), parsed);
        }
        Ok(Self { values })
    }

    fn recognized(key: &str) -> bool {
        key == MAX_JOBS_KEY || key.starts_with("MAX_JOBS_")
    }

    fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    /// Global base quota (`MAX_JOBS`).
    pub fn max_jobs(&self) -> i64 {
        self.get(MAX_JOBS_KEY).unwrap_or(DEFAULT_MAX_JOBS)
    }

    /// Global jitter bound (`MAX_JOBS_JITTER`).
    pub fn max_jobs_jitter(&self) -> i64 {
        self.get(MAX_JOBS_JITTER_KEY).unwrap_or(DISABLED)
    }

    /// Base quota for `queue` (`MAX_JOBS_<QUEUE>`), falling back to the
    /// global quota.
    pub fn max_jobs_for_queue(&self, queue: &str) -> i64 {
        self.get(&format!("{}_{}", MAX_JOBS_KEY, queue.to_uppercase()))
            .unwrap_or_else(|| self.max_jobs())
    }

    /// Jitter bound for `queue` (`MAX_JOBS_JITTER_<QUEUE>`), falling back
    /// to the global bound.
    pub fn max_jobs_jitter_for_queue(&self, queue: &str) -> i64 {
        self.get(&format!("{}_{}", MAX_JOBS_JITTER_KEY, queue.to_uppercase()))
            .unwrap_or_else(|| self.max_jobs_jitter())
    }

    /// Runtime quota in seconds (`MAX_JOBS_RUNTIME`).
    pub fn max_jobs_runtime(&self) -> i64 {
        self.get(MAX_JOBS_RUNTIME_KEY).unwrap_or(DISABLED)
    }

    /// Jitter bound on the runtime quota (`MAX_JOBS_RUNTIME_JITTER`).
    pub fn max_jobs_runtime_jitter(&self) -> i64 {
        self.get(MAX_JOBS_RUNTIME_JITTER_KEY).unwrap_or(DISABLED)
    }

    /// Base quota for a scope.
    pub fn base_quota(&self, scope: &Scope) -> i64 {
        match scope {
            Scope::Global => self.max_jobs(),
            Scope::Queue(name) => self.max_jobs_for_queue(name),
        }
    }

    /// Jitter upper bound for a scope.
    pub fn jitter_bound(&self, scope: &Scope) -> i64 {
        match scope {
            Scope::Global => self.max_jobs_jitter(),
            Scope::Queue(name) => self.max_jobs_jitter_for_queue(name),
        }
    }
}
