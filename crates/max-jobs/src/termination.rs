use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Delivers the graceful-termination request for a process.
///
/// A seam so hosts that manage shutdown themselves (and tests) can
/// substitute delivery; the default implementation signals the owning
/// process directly.
pub trait Signaler: Send + Sync {
    fn send_terminate(&self, pid: u32) -> Result<()>;
}

/// Sends `SIGTERM`, the same request an external supervisor would deliver,
/// so the host's ordinary shutdown sequence (drain in-flight jobs,
/// deregister) runs.
#[derive(Debug, Default)]
pub struct ProcessSignaler;

impl Signaler for ProcessSignaler {
    #[cfg(unix)]
    fn send_terminate(&self, pid: u32) -> Result<()> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn send_terminate(&self, _pid: u32) -> Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "no graceful-termination signal on this platform",
        )
        .into())
    }
}

/// One-shot graceful-termination request for the current process.
pub struct TerminationTrigger {
    pid: u32,
    terminating: AtomicBool,
    signaler: Arc<dyn Signaler>,
}

impl TerminationTrigger {
    pub fn new(signaler: Arc<dyn Signaler>) -> Self {
        Self {
            pid: std::process::id(),
            terminating: AtomicBool::new(false),
            signaler,
        }
    }

    /// Pid of the process this trigger terminates.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether termination has already been requested.
    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// Request graceful termination of the owning process.
    ///
    /// Idempotent: only the first call delivers the signal. Never panics;
    /// delivery failure is logged and the process keeps running past its
    /// quota.
    pub fn request(&self) {
        if self.terminating.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.signaler.send_terminate(self.pid) {
            tracing::warn!(
                "failed to deliver termination signal to pid {}: {}",
                self.pid,
                e
            );
        }
    }
}
