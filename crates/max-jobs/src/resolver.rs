use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::config::{QuotaSettings, Scope};

/// Resolves the effective quota for each scope: base + one uniform random
/// jitter roll in `[0, bound)`.
///
/// Each scope is resolved at most once per process; re-rolling on a later
/// call would let a worker dodge a threshold it had already been dealt.
pub struct QuotaResolver {
    settings: Arc<QuotaSettings>,
    resolved: Mutex<HashMap<Scope, i64>>,
    resolved_runtime: Mutex<Option<i64>>,
}

impl QuotaResolver {
    pub fn new(settings: Arc<QuotaSettings>) -> Self {
        Self {
            settings,
            resolved: Mutex::new(HashMap::new()),
            resolved_runtime: Mutex::new(None),
        }
    }

    /// Effective job quota for `scope`.
    ///
    /// A disabled base (< 0) is returned as-is, without jitter; a quota the
    /// configuration turned off stays unreachable no matter how large its
    /// jitter bound is. Callers treat any resolved value <= 0 as "never
    /// met".
    pub fn effective_quota(&self, scope: &Scope) -> i64 {
        let mut resolved = self.resolved.lock().unwrap();
        if let Some(&quota) = resolved.get(scope) {
            return quota;
        }
        let base = self.settings.base_quota(scope);
        let quota = if base < 0 {
            base
        } else {
            base + jitter(self.settings.jitter_bound(scope))
        };
        tracing::debug!("resolved quota for {}: {}", scope, quota);
        resolved.insert(scope.clone(), quota);
        quota
    }

    /// Effective runtime quota in seconds.
    pub fn effective_runtime_quota(&self) -> i64 {
        let mut resolved = self.resolved_runtime.lock().unwrap();
        *resolved.get_or_insert_with(|| {
            let base = self.settings.max_jobs_runtime();
            if base < 0 {
                base
            } else {
                base + jitter(self.settings.max_jobs_runtime_jitter())
            }
        })
    }
}

/// Uniform random integer in `[0, bound)`; 0 when the bound is not positive.
fn jitter(bound: i64) -> i64 {
    if bound > 0 {
        rand::thread_rng().gen_range(0..bound)
    } else {
        0
    }
}
