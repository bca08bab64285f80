//! Probe launcher. Spawns one external reachability check per target.
//!
//! The scheduler only sees the `ProbeLauncher` / `ProbeProcess` traits.
//! `CommandLauncher` is the production implementation: it runs
//! `ping -c 1 -W 3 <host>` with null stdio and no leaked descriptors.

use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, trace};

use boxwatch_core::{HostStatus, ProbeSettings};

/// Upper bound on the descriptor sweep before exec.
const MAX_SWEPT_FD: libc::c_int = 8192;

/// How a probe process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeExit {
    /// Exit code for a normal exit.
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed.
    pub signal: Option<i32>,
}

impl ProbeExit {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: Signal) -> Self {
        Self {
            code: None,
            signal: Some(signal as i32),
        }
    }

    /// Host status implied by this exit.
    pub fn host_status(&self) -> HostStatus {
        HostStatus::from_exit_code(self.code)
    }
}

impl From<ExitStatus> for ProbeExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// Starts probe processes.
pub trait ProbeLauncher: Send + Sync {
    /// Synchronously start one probe against `hostname`.
    fn launch(&self, hostname: &str) -> io::Result<Box<dyn ProbeProcess>>;
}

/// An outstanding probe process owned by exactly one target.
pub trait ProbeProcess: Send {
    fn pid(&self) -> u32;

    /// Non-blocking exit check. `Ok(Some(_))` means the process has been
    /// reaped.
    fn try_wait(&mut self) -> io::Result<Option<ProbeExit>>;

    /// Ask the probe to stop (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// SIGKILL followed by a blocking reap.
    fn kill_and_reap(&mut self) -> io::Result<ProbeExit>;
}

/// Launches `<program> <args…> <hostname>` as a child process.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    /// A launcher for an arbitrary program; the hostname is appended as the
    /// final argument.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The `ping -c <count> -W <wait>` launcher described by the settings.
    pub fn from_settings(settings: &ProbeSettings) -> Self {
        Self::new(settings.program.clone(), settings.leading_args())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandLauncher {
    fn default() -> Self {
        Self::from_settings(&ProbeSettings::default())
    }
}

impl ProbeLauncher for CommandLauncher {
    fn launch(&self, hostname: &str) -> io::Result<Box<dyn ProbeProcess>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(hostname)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let max_fd = open_fd_limit();
        // SAFETY: the hook runs between fork and exec and only calls
        // fcntl(2), which is async-signal-safe.
        unsafe {
            command.pre_exec(move || {
                mark_descriptors_cloexec(max_fd);
                Ok(())
            });
        }

        let child = command.spawn()?;
        debug!(host = hostname, pid = child.id(), program = %self.program, "probe launched");
        Ok(Box::new(ChildProbe::new(child)))
    }
}

/// Descriptor ceiling, read in the parent since sysconf is not
/// async-signal-safe.
fn open_fd_limit() -> libc::c_int {
    // SAFETY: sysconf has no preconditions.
    let limit = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if limit <= 0 {
        MAX_SWEPT_FD
    } else {
        libc::c_int::try_from(limit)
            .unwrap_or(MAX_SWEPT_FD)
            .min(MAX_SWEPT_FD)
    }
}

/// Mark every descriptor above stdio close-on-exec. The standard library's
/// own exec-error pipe is already close-on-exec, so it keeps working.
fn mark_descriptors_cloexec(max_fd: libc::c_int) {
    for fd in 3..max_fd {
        // SAFETY: F_SETFD on a closed descriptor fails with EBADF, which is
        // ignored.
        unsafe {
            libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
        }
    }
}

/// A probe backed by a real child process.
///
/// Once the child has been reaped, or the kernel reports it is no longer
/// ours (`ECHILD`), its pid may be recycled and is never signalled again.
struct ChildProbe {
    child: Child,
    exit: Option<ProbeExit>,
    lost: bool,
}

impl ChildProbe {
    fn new(child: Child) -> Self {
        Self {
            child,
            exit: None,
            lost: false,
        }
    }

    fn is_gone(&self) -> bool {
        self.exit.is_some() || self.lost
    }

    fn signal(&self, signal: Signal) -> io::Result<()> {
        if self.is_gone() {
            trace!(pid = self.child.id(), ?signal, "child already gone; not signalling");
            return Ok(());
        }
        let pid = Pid::from_raw(self.child.id() as i32);
        match kill(pid, signal) {
            // Already gone; the reap will report it.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(io::Error::from(err)),
        }
    }

    fn note_wait_error(&mut self, err: &io::Error) {
        if err.raw_os_error() == Some(libc::ECHILD) {
            debug!(pid = self.child.id(), "child reaped elsewhere");
            self.lost = true;
        }
    }
}

impl ProbeProcess for ChildProbe {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProbeExit>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        match self.child.try_wait() {
            Ok(status) => {
                self.exit = status.map(ProbeExit::from);
                Ok(self.exit)
            }
            Err(err) => {
                self.note_wait_error(&err);
                Err(err)
            }
        }
    }

    fn terminate(&mut self) -> io::Result<()> {
        trace!(pid = self.child.id(), "sending SIGTERM");
        self.signal(Signal::SIGTERM)
    }

    fn kill_and_reap(&mut self) -> io::Result<ProbeExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        if self.lost {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "probe was reaped elsewhere",
            ));
        }
        trace!(pid = self.child.id(), "sending SIGKILL");
        self.signal(Signal::SIGKILL)?;
        match self.child.wait() {
            Ok(status) => {
                let exit = ProbeExit::from(status);
                self.exit = Some(exit);
                Ok(exit)
            }
            Err(err) => {
                self.note_wait_error(&err);
                Err(err)
            }
        }
    }
}

impl Drop for ChildProbe {
    fn drop(&mut self) {
        // A handle dropped mid-flight must not leave a zombie behind.
        if !self.is_gone()
            && let Ok(None) = self.child.try_wait()
        {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
