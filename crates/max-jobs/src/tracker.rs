use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;

use crate::config::{QuotaSettings, Scope};
use crate::counter::CounterStore;
use crate::resolver::QuotaResolver;
use crate::termination::{ProcessSignaler, Signaler, TerminationTrigger};

/// Which quota a completion crossed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MetQuota {
    /// The process has been running longer than its runtime quota.
    Runtime,
    /// The global job counter reached the global quota.
    Global,
    /// A queue counter reached that queue's quota. Holds the queue name as
    /// the host passed it.
    Queue(String),
}

/// Counts successful job completions and requests graceful process shutdown
/// once a configured quota is met.
///
/// One tracker is constructed at process startup and held by the host's
/// middleware chain for the process lifetime.
pub struct QuotaTracker {
    settings: Arc<QuotaSettings>,
    counters: CounterStore,
    resolver: QuotaResolver,
    trigger: TerminationTrigger,
    started_at: Instant,
    /// Serializes the increment-then-compare sequence so exactly one
    /// completion can observe a threshold-crossing value.
    decision: Mutex<()>,
}

impl QuotaTracker {
    /// Tracker that signals the current process when a quota is met.
    pub fn new(settings: QuotaSettings) -> Self {
        Self::with_signaler(settings, Arc::new(ProcessSignaler))
    }

    /// Tracker with custom signal delivery.
    pub fn with_signaler(settings: QuotaSettings, signaler: Arc<dyn Signaler>) -> Self {
        let settings = Arc::new(settings);
        let tracker = Self {
            resolver: QuotaResolver::new(Arc::clone(&settings)),
            settings,
            counters: CounterStore::new(),
            trigger: TerminationTrigger::new(signaler),
            started_at: Instant::now(),
            decision: Mutex::new(()),
        };
        tracing::info!(
            "job quota tracking enabled: max jobs {}, shutting down pid {} when a quota is met",
            tracker.settings.max_jobs(),
            tracker.trigger.pid()
        );
        tracker
    }

    /// Host hook wrapped around each job execution.
    ///
    /// The worker identity and payload are part of the host's middleware
    /// signature and are not consulted. A failing job re-propagates its
    /// error unchanged and is never counted; only successful completions
    /// advance the quota counters.
    pub fn around_job<W, P, F, T, E>(
        &self,
        _worker: &W,
        _payload: &P,
        queue: &str,
        job: F,
    ) -> Result<T, E>
    where
        W: ?Sized,
        P: ?Sized,
        F: FnOnce() -> Result<T, E>,
    {
        let result = job();
        if result.is_ok() {
            self.record_completion(queue);
        }
        result
    }

    /// Record one successful completion on `queue` and evaluate the quotas
    /// in precedence order: runtime, then global, then queue.
    ///
    /// Must only be called for jobs that completed without error. Returns
    /// the quota this completion met, if any; the first match wins and the
    /// termination trigger fires exactly once per process. Once the process
    /// is terminating, completions are no longer counted.
    pub fn record_completion(&self, queue: &str) -> Option<MetQuota> {
        if self.trigger.is_terminating() {
            return None;
        }
        let _decision = self.decision.lock().unwrap();

        let mut met: Option<MetQuota> = None;

        if self.runtime_quota_met() {
            met = Some(MetQuota::Runtime);
        }

        let total = self.counters.increment(&Scope::Global);
        if met.is_none() && quota_met(total, self.resolver.effective_quota(&Scope::Global)) {
            met = Some(MetQuota::Global);
        }

        let queue_scope = Scope::queue(queue);
        let for_queue = self.counters.increment(&queue_scope);
        if met.is_none() && quota_met(for_queue, self.resolver.effective_quota(&queue_scope)) {
            met = Some(MetQuota::Queue(queue.to_string()));
        }

        if let Some(met) = &met {
            self.log_quota_met(met);
            self.trigger.request();
        }
        met
    }

    /// Total successful completions so far.
    pub fn total_count(&self) -> u64 {
        self.counters.get(&Scope::Global)
    }

    /// Successful completions attributed to `queue`.
    pub fn count_for_queue(&self, queue: &str) -> u64 {
        self.counters.get(&Scope::queue(queue))
    }

    /// Whether this tracker has already requested termination.
    pub fn is_terminating(&self) -> bool {
        self.trigger.is_terminating()
    }

    /// The effective (jittered) quota for a scope, resolving it if needed.
    pub fn effective_quota(&self, scope: &Scope) -> i64 {
        self.resolver.effective_quota(scope)
    }

    fn runtime_quota_met(&self) -> bool {
        let quota = self.resolver.effective_runtime_quota();
        quota > 0 && self.started_at.elapsed().as_secs() >= quota as u64
    }

    fn log_quota_met(&self, met: &MetQuota) {
        let pid = self.trigger.pid();
        match met {
            MetQuota::Runtime => {
                tracing::info!("runtime quota met, shutting down pid {}", pid);
            }
            MetQuota::Global => {
                tracing::info!("total job quota met, shutting down pid {}", pid);
            }
            MetQuota::Queue(queue) => {
                tracing::info!("job quota met for queue {:?}, shutting down pid {}", queue, pid);
            }
        }
    }
}

/// Exact-crossing check: the counter matches the quota only on the call
/// that reaches it, and a resolved quota of 0 or less is unreachable.
/// Counters advanced anywhere but the decision engine would skip the
/// crossing value entirely; the engine is the only writer.
fn quota_met(counter: u64, quota: i64) -> bool {
    quota > 0 && counter == quota as u64
}
