//! boxwatch.toml configuration parser.
//!
//! The file format keeps durations as strings (`"100ms"`, `"4s"`, `"1m"`)
//! and every key optional. `SchedulerSettings` and `ProbeSettings` are the
//! resolved, validated forms the scheduler consumes.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoxwatchConfig {
    pub scheduler: Option<SchedulerConfig>,
    pub probe: Option<ProbeConfig>,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick: Option<String>,
    pub max_children: Option<usize>,
    pub polling_interval: Option<String>,
    pub active_timeout: Option<String>,
    pub terminate_grace: Option<String>,
    pub startup_delay: Option<String>,
    pub stagger_step: Option<u32>,
    pub stagger_window: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub program: Option<String>,
    pub count: Option<u32>,
    /// Per-reply wait handed to the probe, in whole seconds.
    pub wait: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    pub interval: Option<String>,
}

/// Resolved scheduler timing and admission settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick: Duration,
    pub max_children: usize,
    pub polling_interval: Duration,
    pub active_timeout: Duration,
    pub terminate_grace: Duration,
    pub startup_delay: Duration,
    pub stagger_step: u32,
    pub stagger_window: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            max_children: 10,
            polling_interval: Duration::from_secs(20),
            active_timeout: Duration::from_secs(4),
            terminate_grace: Duration::from_secs(1),
            startup_delay: Duration::from_secs(2),
            // 17 and 200 are coprime, so offsets cycle through every slot.
            stagger_step: 17,
            stagger_window: 200,
        }
    }
}

impl SchedulerSettings {
    /// Whole ticks covered by `duration`, rounded down.
    pub fn ticks(&self, duration: Duration) -> u32 {
        if self.tick.is_zero() {
            return 0;
        }
        let ticks = duration.as_nanos() / self.tick.as_nanos();
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    pub fn polling_interval_ticks(&self) -> u32 {
        self.ticks(self.polling_interval)
    }

    pub fn active_timeout_ticks(&self) -> u32 {
        self.ticks(self.active_timeout)
    }

    pub fn terminate_grace_ticks(&self) -> u32 {
        self.ticks(self.terminate_grace)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if self.max_children == 0 {
            return Err(ConfigError::NoChildren);
        }
        if self.stagger_window == 0 {
            return Err(ConfigError::ZeroStaggerWindow);
        }
        Ok(())
    }
}

/// Resolved probe invocation: `<program> -c <count> -W <wait> <host>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub program: String,
    pub count: u32,
    pub wait_secs: u32,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            program: "ping".to_string(),
            count: 1,
            wait_secs: 3,
        }
    }
}

impl ProbeSettings {
    /// Arguments placed between the program name and the hostname.
    pub fn leading_args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.count.to_string(),
            "-W".to_string(),
            self.wait_secs.to_string(),
        ]
    }

    /// Full argument vector for probing one host, program name first.
    pub fn argv(&self, hostname: &str) -> Vec<String> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.leading_args());
        argv.push(hostname.to_string());
        argv
    }
}

/// A target from the `[[target]]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub host: String,
    /// Overrides `scheduler.polling_interval` for this host.
    pub interval: Option<Duration>,
}

impl BoxwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BoxwatchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn scheduler_settings(&self) -> Result<SchedulerSettings, ConfigError> {
        let defaults = SchedulerSettings::default();
        let Some(raw) = &self.scheduler else {
            return Ok(defaults);
        };

        let settings = SchedulerSettings {
            tick: duration_or("scheduler.tick", raw.tick.as_deref(), defaults.tick)?,
            max_children: raw.max_children.unwrap_or(defaults.max_children),
            polling_interval: duration_or(
                "scheduler.polling_interval",
                raw.polling_interval.as_deref(),
                defaults.polling_interval,
            )?,
            active_timeout: duration_or(
                "scheduler.active_timeout",
                raw.active_timeout.as_deref(),
                defaults.active_timeout,
            )?,
            terminate_grace: duration_or(
                "scheduler.terminate_grace",
                raw.terminate_grace.as_deref(),
                defaults.terminate_grace,
            )?,
            startup_delay: duration_or(
                "scheduler.startup_delay",
                raw.startup_delay.as_deref(),
                defaults.startup_delay,
            )?,
            stagger_step: raw.stagger_step.unwrap_or(defaults.stagger_step),
            stagger_window: raw.stagger_window.unwrap_or(defaults.stagger_window),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn probe_settings(&self) -> Result<ProbeSettings, ConfigError> {
        let defaults = ProbeSettings::default();
        let settings = match &self.probe {
            Some(raw) => ProbeSettings {
                program: raw.program.clone().unwrap_or(defaults.program),
                count: raw.count.unwrap_or(defaults.count),
                wait_secs: raw.wait.unwrap_or(defaults.wait_secs),
            },
            None => defaults,
        };
        if settings.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        Ok(settings)
    }

    /// Resolve both setting groups and check the probe's own deadline sits
    /// below the scheduler's watchdog.
    pub fn resolve(&self) -> Result<(SchedulerSettings, ProbeSettings), ConfigError> {
        let scheduler = self.scheduler_settings()?;
        let probe = self.probe_settings()?;
        if Duration::from_secs(u64::from(probe.wait_secs)) >= scheduler.active_timeout {
            return Err(ConfigError::ProbeOutlivesWatchdog {
                wait_secs: probe.wait_secs,
                timeout_ms: scheduler.active_timeout.as_millis(),
            });
        }
        Ok((scheduler, probe))
    }

    pub fn target_specs(&self) -> Result<Vec<TargetSpec>, ConfigError> {
        self.targets
            .iter()
            .map(|t| {
                let interval = match t.interval.as_deref() {
                    Some(raw) => Some(parse_duration(raw).ok_or_else(|| {
                        ConfigError::InvalidDuration {
                            key: "target.interval",
                            value: raw.to_string(),
                        }
                    })?),
                    None => None,
                };
                Ok(TargetSpec {
                    host: t.host.clone(),
                    interval,
                })
            })
            .collect()
    }
}

fn duration_or(
    key: &'static str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(value) => parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
            key,
            value: value.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
