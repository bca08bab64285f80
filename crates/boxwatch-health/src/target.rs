//! Target record and the per-tick probe state machine.

use std::sync::Arc;

use tracing::{debug, warn};

use boxwatch_core::{HostStatus, ProcessState, TargetSnapshot};

use crate::probe::{ProbeLauncher, ProbeProcess};
use crate::status::{StatusCell, TargetHandle};

/// Everything a target step needs from the surrounding pass.
pub(crate) struct PassContext<'a> {
    pub launcher: &'a dyn ProbeLauncher,
    pub max_children: usize,
    pub active_timeout_ticks: u32,
    pub terminate_grace_ticks: u32,
    /// Slots held by admitted or in-flight targets, counted before the walk
    /// and bumped on each admission.
    pub slots_in_use: usize,
}

/// What happened to an outstanding probe during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reclaim {
    Idle,
    Reaped,
    /// SIGKILL went out but the wait failed.
    KilledUnreaped,
}

pub(crate) struct Target {
    hostname: Arc<str>,
    polling_interval_ticks: u32,
    countdown: u32,
    process: Option<Box<dyn ProbeProcess>>,
    state: ProcessState,
    cell: Arc<StatusCell>,
}

impl Target {
    pub(crate) fn new(hostname: &str, polling_interval_ticks: u32, initial_countdown: u32) -> Self {
        Self {
            hostname: Arc::from(hostname),
            polling_interval_ticks,
            countdown: initial_countdown,
            process: None,
            state: ProcessState::Pending,
            cell: Arc::new(StatusCell::new()),
        }
    }

    pub(crate) fn handle(&self) -> TargetHandle {
        TargetHandle::new(self.hostname.clone(), self.cell.clone())
    }

    pub(crate) fn state(&self) -> ProcessState {
        self.state
    }

    pub(crate) fn has_process(&self) -> bool {
        self.process.is_some()
    }

    pub(crate) fn snapshot(&self) -> TargetSnapshot {
        TargetSnapshot {
            hostname: self.hostname.to_string(),
            state: self.state,
            status: self.cell.status(),
            countdown: self.countdown,
            pid: self.process.as_ref().map(|p| p.pid()),
            cycles: self.cell.cycles(),
        }
    }

    /// Fire the completion edge; called once when the target enters
    /// `Complete`.
    pub(crate) fn notify_complete(&self) {
        self.cell.complete_cycle();
    }

    /// Advance by exactly one transition.
    pub(crate) fn step(&mut self, ctx: &mut PassContext<'_>) {
        let before = self.state;
        self.state = match before {
            ProcessState::Pending => self.step_pending(),
            ProcessState::Ready => self.step_ready(ctx),
            ProcessState::Resourced => self.step_resourced(ctx),
            ProcessState::Active => self.step_active(ctx),
            ProcessState::Terminating => self.step_terminating(),
            ProcessState::Kill => self.step_kill(),
            ProcessState::Complete => {
                self.countdown = self.polling_interval_ticks;
                ProcessState::Pending
            }
        };

        if self.state != before {
            debug!(
                host = %self.hostname,
                from = %before,
                to = %self.state,
                slots = ctx.slots_in_use,
                "target transition"
            );
        }
    }

    fn step_pending(&mut self) -> ProcessState {
        if self.countdown > 0 {
            self.countdown -= 1;
            ProcessState::Pending
        } else {
            ProcessState::Ready
        }
    }

    fn step_ready(&mut self, ctx: &mut PassContext<'_>) -> ProcessState {
        if ctx.slots_in_use < ctx.max_children {
            ctx.slots_in_use += 1;
            ProcessState::Resourced
        } else {
            ProcessState::Ready
        }
    }

    fn step_resourced(&mut self, ctx: &mut PassContext<'_>) -> ProcessState {
        debug_assert!(self.process.is_none(), "target already owns a probe");

        match ctx.launcher.launch(&self.hostname) {
            Ok(process) => {
                self.process = Some(process);
                self.countdown = ctx.active_timeout_ticks;
                ProcessState::Active
            }
            Err(e) => {
                // Not retried until the next polling interval.
                debug!(host = %self.hostname, error = %e, "probe launch failed");
                ProcessState::Complete
            }
        }
    }

    fn step_active(&mut self, ctx: &PassContext<'_>) -> ProcessState {
        if self.poll_exit() {
            return ProcessState::Complete;
        }

        if self.countdown > 0 {
            self.countdown -= 1;
            return ProcessState::Active;
        }

        if let Some(process) = self.process.as_mut()
            && let Err(e) = process.terminate()
        {
            warn!(host = %self.hostname, pid = process.pid(), error = %e, "SIGTERM failed");
        }
        self.cell.publish(HostStatus::Timeout);
        self.countdown = ctx.terminate_grace_ticks;
        ProcessState::Terminating
    }

    fn step_terminating(&mut self) -> ProcessState {
        if self.poll_exit() {
            return ProcessState::Complete;
        }

        if self.countdown > 0 {
            self.countdown -= 1;
            ProcessState::Terminating
        } else {
            ProcessState::Kill
        }
    }

    fn step_kill(&mut self) -> ProcessState {
        // Without the blocking reap the probe would linger as a zombie.
        self.reclaim();
        ProcessState::Complete
    }

    /// Non-blocking exit check. Returns true once the probe is reaped (or
    /// the handle is missing). In `Active` the exit code becomes the host
    /// status; in `Terminating` the status stays `Timeout`.
    fn poll_exit(&mut self) -> bool {
        let Some(process) = self.process.as_mut() else {
            warn!(host = %self.hostname, state = %self.state, "no probe handle");
            return true;
        };

        match process.try_wait() {
            Ok(Some(exit)) => {
                debug!(
                    host = %self.hostname,
                    pid = process.pid(),
                    code = ?exit.code,
                    signal = ?exit.signal,
                    "probe exited"
                );
                if self.state == ProcessState::Active {
                    self.cell.publish(exit.host_status());
                }
                self.process = None;
                true
            }
            Ok(None) => false,
            Err(e) => {
                // Treated as still running; the countdown keeps advancing.
                debug!(host = %self.hostname, pid = process.pid(), error = %e, "probe wait failed");
                false
            }
        }
    }

    /// SIGKILL and reap any outstanding probe.
    pub(crate) fn reclaim(&mut self) -> Reclaim {
        let Some(mut process) = self.process.take() else {
            return Reclaim::Idle;
        };
        let pid = process.pid();
        match process.kill_and_reap() {
            Ok(exit) => {
                debug!(host = %self.hostname, pid, signal = ?exit.signal, "probe killed and reaped");
                Reclaim::Reaped
            }
            Err(e) => {
                warn!(host = %self.hostname, pid, error = %e, "probe reap failed");
                Reclaim::KilledUnreaped
            }
        }
    }
}
