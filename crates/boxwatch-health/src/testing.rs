//! Scripted probes for driving the scheduler without real processes.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use nix::sys::signal::Signal;

use crate::probe::{ProbeExit, ProbeLauncher, ProbeProcess};

#[derive(Debug, Clone, Copy)]
pub(crate) enum StubBehavior {
    /// Exit with `code` after this many unsuccessful polls.
    ExitAfter { polls: u32, code: i32 },
    /// Never exit on its own; honour SIGTERM.
    ExitOnTerm,
    /// Never exit on its own; ignore SIGTERM.
    Hang,
    /// Refuse to spawn.
    FailSpawn,
}

impl StubBehavior {
    pub(crate) fn exit(polls: u32, code: i32) -> Self {
        StubBehavior::ExitAfter { polls, code }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StubLog {
    pub launches: Vec<String>,
    pub launch_failures: usize,
    pub terms: Vec<String>,
    pub kills: Vec<String>,
    pub reaps: Vec<String>,
    /// Highest number of simultaneously live probes seen for any one host.
    pub max_live_per_host: usize,
    live: HashMap<String, usize>,
}

impl StubLog {
    pub(crate) fn live(&self, host: &str) -> usize {
        self.live.get(host).copied().unwrap_or(0)
    }

    pub(crate) fn total_live(&self) -> usize {
        self.live.values().sum()
    }
}

#[derive(Clone)]
pub(crate) struct StubLauncher {
    default: StubBehavior,
    per_host: HashMap<String, StubBehavior>,
    log: Arc<Mutex<StubLog>>,
    next_pid: Arc<AtomicU32>,
}

impl StubLauncher {
    pub(crate) fn new(default: StubBehavior) -> Self {
        Self {
            default,
            per_host: HashMap::new(),
            log: Arc::new(Mutex::new(StubLog::default())),
            next_pid: Arc::new(AtomicU32::new(1000)),
        }
    }

    pub(crate) fn with_host(mut self, host: &str, behavior: StubBehavior) -> Self {
        self.per_host.insert(host.to_string(), behavior);
        self
    }

    pub(crate) fn log(&self) -> StubLog {
        self.log.lock().unwrap().clone()
    }
}

impl ProbeLauncher for StubLauncher {
    fn launch(&self, hostname: &str) -> io::Result<Box<dyn ProbeProcess>> {
        let behavior = self.per_host.get(hostname).copied().unwrap_or(self.default);
        let mut log = self.log.lock().unwrap();
        if let StubBehavior::FailSpawn = behavior {
            log.launch_failures += 1;
            return Err(io::Error::new(io::ErrorKind::NotFound, "stub spawn failure"));
        }

        log.launches.push(hostname.to_string());
        let live = log.live.entry(hostname.to_string()).or_insert(0);
        *live += 1;
        let live = *live;
        log.max_live_per_host = log.max_live_per_host.max(live);

        Ok(Box::new(StubProcess {
            host: hostname.to_string(),
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
            behavior,
            polls: 0,
            terminated: false,
            exit: None,
            log: self.log.clone(),
        }))
    }
}

struct StubProcess {
    host: String,
    pid: u32,
    behavior: StubBehavior,
    polls: u32,
    terminated: bool,
    exit: Option<ProbeExit>,
    log: Arc<Mutex<StubLog>>,
}

impl StubProcess {
    fn reap(&mut self, exit: ProbeExit) {
        self.exit = Some(exit);
        let mut log = self.log.lock().unwrap();
        log.reaps.push(self.host.clone());
        if let Some(live) = log.live.get_mut(&self.host) {
            *live -= 1;
        }
    }
}

impl ProbeProcess for StubProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn try_wait(&mut self) -> io::Result<Option<ProbeExit>> {
        if self.exit.is_some() {
            return Ok(self.exit);
        }
        let exit = match self.behavior {
            StubBehavior::ExitAfter { polls, code } => {
                if self.polls >= polls {
                    Some(ProbeExit::exited(code))
                } else {
                    self.polls += 1;
                    None
                }
            }
            StubBehavior::ExitOnTerm if self.terminated => {
                Some(ProbeExit::signaled(Signal::SIGTERM))
            }
            _ => None,
        };
        if let Some(exit) = exit {
            self.reap(exit);
        }
        Ok(exit)
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.terminated = true;
        self.log.lock().unwrap().terms.push(self.host.clone());
        Ok(())
    }

    fn kill_and_reap(&mut self) -> io::Result<ProbeExit> {
        self.log.lock().unwrap().kills.push(self.host.clone());
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let exit = ProbeExit::signaled(Signal::SIGKILL);
        self.reap(exit);
        Ok(exit)
    }
}
