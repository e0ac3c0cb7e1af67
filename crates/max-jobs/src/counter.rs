use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::Scope;

/// Thread-safe job counters, one per scope.
///
/// A counter starts at 0 on first access, advances by exactly 1 per
/// recorded completion and is never decremented; it lives for the process
/// lifetime.
#[derive(Debug, Default)]
pub struct CounterStore {
    counters: Mutex<HashMap<Scope, u64>>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `scope` and return the new value.
    pub fn increment(&self, scope: &Scope) -> u64 {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(scope.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Current value for `scope`, 0 if it was never incremented.
    pub fn get(&self, scope: &Scope) -> u64 {
        let counters = self.counters.lock().unwrap();
        counters.get(scope).copied().unwrap_or(0)
    }
}
