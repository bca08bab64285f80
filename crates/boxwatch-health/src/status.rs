//! Latest host status per target, readable without locks.
//!
//! The scheduler is the only writer. Readers load a single atomic byte, so
//! a value may be up to one polling interval old but is never torn. Each
//! completed cycle bumps a `watch` counter, giving consumers an
//! edge-triggered wake-up; a missed edge just means "read the current
//! status".

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use boxwatch_core::HostStatus;

#[derive(Debug)]
pub(crate) struct StatusCell {
    status: AtomicU8,
    completions: watch::Sender<u64>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (completions, _) = watch::channel(0);
        Self {
            status: AtomicU8::new(HostStatus::Unknown.as_u8()),
            completions,
        }
    }

    pub(crate) fn publish(&self, status: HostStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    pub(crate) fn status(&self) -> HostStatus {
        HostStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Fire the completion edge for one finished cycle.
    pub(crate) fn complete_cycle(&self) {
        // send_modify updates the value even with no live receivers.
        self.completions.send_modify(|cycles| *cycles += 1);
    }

    pub(crate) fn cycles(&self) -> u64 {
        *self.completions.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.completions.subscribe()
    }
}

/// Consumer-side view of one registered target.
///
/// Cheap to clone; all clones observe the same status cell.
#[derive(Debug, Clone)]
pub struct TargetHandle {
    hostname: Arc<str>,
    cell: Arc<StatusCell>,
}

impl TargetHandle {
    pub(crate) fn new(hostname: Arc<str>, cell: Arc<StatusCell>) -> Self {
        Self { hostname, cell }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Last resolved status. Never blocks and never starts a probe.
    pub fn status(&self) -> HostStatus {
        self.cell.status()
    }

    /// Number of probe cycles completed so far.
    pub fn cycles(&self) -> u64 {
        self.cell.cycles()
    }

    /// Subscribe to completion edges. The receiver's value is the cycle
    /// count; `changed()` resolves once per observed completion.
    pub fn completions(&self) -> watch::Receiver<u64> {
        self.cell.subscribe()
    }
}
