//! Configuration error types.

use thiserror::Error;

/// Errors raised while resolving a `boxwatch.toml` into runtime settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid duration for `{key}`: {value:?}")]
    InvalidDuration { key: &'static str, value: String },

    #[error("`scheduler.tick` must be greater than zero")]
    ZeroTick,

    #[error("`scheduler.max_children` must be at least 1")]
    NoChildren,

    #[error("`scheduler.stagger_window` must be at least 1")]
    ZeroStaggerWindow,

    #[error("`probe.program` must not be empty")]
    EmptyProgram,

    #[error("probe wait ({wait_secs}s) must be shorter than the active timeout ({timeout_ms}ms)")]
    ProbeOutlivesWatchdog { wait_secs: u32, timeout_ms: u128 },
}
