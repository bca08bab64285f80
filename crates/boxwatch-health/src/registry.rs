//! Target registry: the ordered list the scheduler walks each tick.
//!
//! Order is the fairness mechanism: a pass rebuilds the list as "targets
//! still in progress, in their previous order" followed by "targets that
//! completed this pass". A target that just finished therefore queues
//! behind everyone already waiting.

use tracing::debug;

use boxwatch_core::{ProcessState, TargetSnapshot};

use crate::error::RegistrationError;
use crate::status::TargetHandle;
use crate::target::{PassContext, Reclaim, Target};

/// Reject hostnames the probe cannot take as a single positional argument.
pub fn validate_hostname(hostname: &str) -> Result<(), RegistrationError> {
    if hostname.is_empty() {
        return Err(RegistrationError::EmptyHostname);
    }
    if hostname.chars().any(char::is_whitespace) {
        return Err(RegistrationError::Whitespace(hostname.to_string()));
    }
    // NUL can never reach exec, so the probe would fail every cycle.
    if hostname.chars().any(char::is_control) {
        return Err(RegistrationError::ControlCharacter(hostname.to_string()));
    }
    if hostname.starts_with('-') {
        return Err(RegistrationError::OptionLike(hostname.to_string()));
    }
    Ok(())
}

/// Outcome of one registry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PassOutcome {
    pub completed: usize,
    pub in_flight: usize,
}

/// Outcome of reclaiming every outstanding probe at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Probes sent SIGKILL.
    pub killed: usize,
    /// Probes whose exit status was collected.
    pub reaped: usize,
}

pub(crate) struct Registry {
    targets: Vec<Target>,
    phase: u32,
    stagger_step: u32,
    stagger_window: u32,
}

impl Registry {
    pub(crate) fn new(stagger_step: u32, stagger_window: u32) -> Self {
        Self {
            targets: Vec::new(),
            phase: 0,
            stagger_step,
            stagger_window: stagger_window.max(1),
        }
    }

    /// Initial countdown for the next registration, spread across the
    /// stagger window so targets registered together don't probe together.
    fn next_offset(&mut self) -> u32 {
        let next = (u64::from(self.phase) + u64::from(self.stagger_step))
            % u64::from(self.stagger_window);
        self.phase = next as u32;
        self.phase
    }

    pub(crate) fn register(
        &mut self,
        hostname: &str,
        polling_interval_ticks: u32,
    ) -> Result<TargetHandle, RegistrationError> {
        validate_hostname(hostname)?;

        let offset = self.next_offset();
        let target = Target::new(hostname, polling_interval_ticks, offset);
        let handle = target.handle();
        self.targets.push(target);

        debug!(host = hostname, polling_interval_ticks, offset, "target registered");
        Ok(handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    /// Targets holding a slot (admitted or in flight).
    pub(crate) fn slots_in_use(&self) -> usize {
        self.targets.iter().filter(|t| t.state().holds_slot()).count()
    }

    /// Targets with a live probe.
    pub(crate) fn in_flight(&self) -> usize {
        self.targets.iter().filter(|t| t.state().is_in_flight()).count()
    }

    /// Step every target once in order, then move the ones that completed
    /// to the tail.
    pub(crate) fn run_pass(&mut self, ctx: &mut PassContext<'_>) -> PassOutcome {
        let mut kept = Vec::with_capacity(self.targets.len());
        let mut completed = Vec::new();

        for mut target in self.targets.drain(..) {
            target.step(ctx);
            if target.state() == ProcessState::Complete {
                target.notify_complete();
                completed.push(target);
            } else {
                kept.push(target);
            }
        }

        let outcome = PassOutcome {
            completed: completed.len(),
            in_flight: kept.iter().filter(|t| t.state().is_in_flight()).count(),
        };
        kept.extend(completed);
        self.targets = kept;
        outcome
    }

    /// SIGKILL and reap every outstanding probe.
    pub(crate) fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        for target in &mut self.targets {
            match target.reclaim() {
                Reclaim::Idle => {}
                Reclaim::Reaped => {
                    report.killed += 1;
                    report.reaped += 1;
                }
                Reclaim::KilledUnreaped => report.killed += 1,
            }
        }
        report
    }

    pub(crate) fn snapshot(&self) -> Vec<TargetSnapshot> {
        self.targets.iter().map(Target::snapshot).collect()
    }

    pub(crate) fn handles(&self) -> Vec<TargetHandle> {
        self.targets.iter().map(Target::handle).collect()
    }

    #[cfg(test)]
    pub(crate) fn outstanding_processes(&self) -> usize {
        self.targets.iter().filter(|t| t.has_process()).count()
    }
}
