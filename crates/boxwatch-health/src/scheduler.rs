//! The single control loop that drives every target.
//!
//! Each tick takes the registry lock once, steps every target in order,
//! relocates completed targets to the tail, and releases the lock before
//! sleeping. On shutdown no further admissions happen and every
//! outstanding probe is killed and reaped before `run` returns.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use boxwatch_core::{SchedulerSettings, TargetSnapshot};

use crate::error::{RegistrationError, SchedulerResult};
use crate::probe::ProbeLauncher;
use crate::registry::{DrainReport, Registry};
use crate::status::TargetHandle;
use crate::target::PassContext;

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Targets in Active, Terminating or Kill after the pass.
    pub active: usize,
    /// Targets that entered Complete during the pass.
    pub completed: usize,
}

struct Shared {
    settings: SchedulerSettings,
    launcher: Arc<dyn ProbeLauncher>,
    registry: Mutex<Registry>,
    active: AtomicUsize,
    running: AtomicBool,
}

/// Owns the registry and the probe launcher. Cheap to clone; clones share
/// the same registry.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler. Fails if the settings are invalid.
    pub fn new(
        settings: SchedulerSettings,
        launcher: Arc<dyn ProbeLauncher>,
    ) -> SchedulerResult<Self> {
        settings.validate()?;
        let registry = Registry::new(settings.stagger_step, settings.stagger_window);
        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                launcher,
                registry: Mutex::new(registry),
                active: AtomicUsize::new(0),
                running: AtomicBool::new(false),
            }),
        })
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.shared.settings
    }

    /// Register a host with the default polling interval.
    pub fn register(&self, hostname: &str) -> Result<TargetHandle, RegistrationError> {
        self.register_with_interval(hostname, None)
    }

    /// Register a host, optionally overriding the polling interval.
    pub fn register_with_interval(
        &self,
        hostname: &str,
        interval: Option<Duration>,
    ) -> Result<TargetHandle, RegistrationError> {
        let settings = &self.shared.settings;
        let interval_ticks = settings.ticks(interval.unwrap_or(settings.polling_interval));
        self.registry().register(hostname, interval_ticks)
    }

    /// Run one pass over the registry.
    pub fn tick(&self) -> PassSummary {
        let settings = &self.shared.settings;
        let mut registry = self.registry();

        let mut ctx = PassContext {
            launcher: self.shared.launcher.as_ref(),
            max_children: settings.max_children,
            active_timeout_ticks: settings.active_timeout_ticks(),
            terminate_grace_ticks: settings.terminate_grace_ticks(),
            slots_in_use: registry.slots_in_use(),
        };
        let outcome = registry.run_pass(&mut ctx);
        let active = registry.in_flight();
        drop(registry);

        self.shared.active.store(active, Ordering::Relaxed);
        trace!(active, completed = outcome.completed, "scheduler pass");
        PassSummary {
            active,
            completed: outcome.completed,
        }
    }

    /// Targets with a live probe as of the last pass.
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn target_count(&self) -> usize {
        self.registry().len()
    }

    /// Per-target diagnostics in current registry order.
    pub fn snapshot(&self) -> Vec<TargetSnapshot> {
        self.registry().snapshot()
    }

    pub fn handles(&self) -> Vec<TargetHandle> {
        self.registry().handles()
    }

    /// Kill and reap every outstanding probe.
    pub fn drain(&self) -> DrainReport {
        let report = self.registry().drain();
        self.shared.active.store(0, Ordering::Relaxed);
        report
    }

    /// Drive the registry until `shutdown` flips to true (or its sender is
    /// dropped), then drain.
    ///
    /// Only one loop may drive a scheduler. A call made while another loop
    /// is running returns an empty report at once and leaves it untouched.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> DrainReport {
        let settings = &self.shared.settings;
        if self.shared.running.swap(true, Ordering::AcqRel) {
            warn!("scheduler loop already running; ignoring second start");
            return DrainReport::default();
        }
        info!(
            targets = self.target_count(),
            max_children = settings.max_children,
            tick_ms = settings.tick.as_millis() as u64,
            "scheduler started"
        );

        let cancelled = tokio::select! {
            _ = tokio::time::sleep(settings.startup_delay) => false,
            _ = shutdown.changed() => true,
        };

        if !cancelled {
            while !*shutdown.borrow() {
                self.tick();

                tokio::select! {
                    _ = tokio::time::sleep(settings.tick) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        self.shared.running.store(false, Ordering::Release);
        info!("scheduler shutting down");

        let report = self.drain();
        info!(killed = report.killed, reaped = report.reaped, "scheduler stopped");
        report
    }

    /// Spawn `run` on the current tokio runtime.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<DrainReport> {
        let scheduler = self.clone();
        debug!("spawning scheduler task");
        tokio::spawn(async move { scheduler.run(shutdown).await })
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panic mid-pass leaves every target in a valid state.
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
