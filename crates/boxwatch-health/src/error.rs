//! Scheduler error types.

use thiserror::Error;

use boxwatch_core::ConfigError;

/// A hostname was refused at registration; no target was created.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid/null remote host")]
    EmptyHostname,

    #[error("hostname {0:?} contains whitespace")]
    Whitespace(String),

    #[error("hostname {0:?} contains a control character")]
    ControlCharacter(String),

    #[error("hostname {0:?} would be parsed as a probe option")]
    OptionLike(String),
}

/// Errors that can occur while building or feeding the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler settings: {0}")]
    Config(#[from] ConfigError),

    #[error("registration rejected: {0}")]
    Registration(#[from] RegistrationError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
