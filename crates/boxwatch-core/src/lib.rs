//! Shared types and configuration for boxwatch.
//!
//! The scheduler (`boxwatch-health`) and the daemon (`boxwatchd`) both
//! depend on this crate for the host/process state enums and for the
//! `boxwatch.toml` parser.

pub mod config;
pub mod error;
pub mod types;

pub use config::{parse_duration, BoxwatchConfig, ProbeSettings, SchedulerSettings, TargetSpec};
pub use error::ConfigError;
pub use types::*;
