//! Reachability probing for a fleet of hosts.
//!
//! A single scheduler task drives every registered target through a small
//! state machine, launching one external `ping` per target under a global
//! concurrency cap. Consumers read the latest status through lock-free
//! handles and may await per-target completion edges.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── Registry (ordered targets, one mutex, tail relocation per pass)
//!   │   └── Target
//!   │       ├── ProcessState FSM (Pending → … → Complete)
//!   │       ├── ProbeProcess handle (at most one)
//!   │       └── StatusCell (atomic HostStatus + completion watch)
//!   ├── ProbeLauncher (CommandLauncher in production)
//!   └── run() loop: tick, sleep, drain on shutdown
//! ```
//!
//! # Fairness
//!
//! Targets finishing a cycle move to the registry tail after each pass,
//! so with fewer slots than targets admission rotates round-robin and no
//! host starves the others.

pub mod error;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod status;
mod target;

#[cfg(test)]
mod testing;

pub use error::{RegistrationError, SchedulerError, SchedulerResult};
pub use probe::{CommandLauncher, ProbeExit, ProbeLauncher, ProbeProcess};
pub use registry::{validate_hostname, DrainReport};
pub use scheduler::{PassSummary, Scheduler};
pub use status::TargetHandle;
