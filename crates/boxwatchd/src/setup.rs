//! Target assembly shared by every subcommand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;
use tracing::{info, warn};

use boxwatch_core::{BoxwatchConfig, TargetSpec};
use boxwatch_health::{CommandLauncher, Scheduler, TargetHandle};

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Path to boxwatch.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Host to probe. Repeatable; added after the config's targets.
    #[arg(long = "host")]
    pub hosts: Vec<String>,
}

/// A scheduler with its targets registered but not yet running.
pub struct Monitor {
    pub scheduler: Scheduler,
    pub handles: Vec<TargetHandle>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<BoxwatchConfig> {
    match path {
        Some(path) => BoxwatchConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(BoxwatchConfig::default()),
    }
}

/// Config targets first, then command-line hosts not already listed.
pub fn merge_targets(mut targets: Vec<TargetSpec>, hosts: &[String]) -> Vec<TargetSpec> {
    for host in hosts {
        if !targets.iter().any(|t| &t.host == host) {
            targets.push(TargetSpec {
                host: host.clone(),
                interval: None,
            });
        }
    }
    targets
}

pub fn build(args: &TargetArgs) -> anyhow::Result<Monitor> {
    let config = load_config(args.config.as_deref())?;
    let (settings, probe) = config.resolve()?;
    let targets = merge_targets(config.target_specs()?, &args.hosts);
    if targets.is_empty() {
        bail!("no targets: pass --host or add [[target]] entries to the config");
    }

    let launcher = Arc::new(CommandLauncher::from_settings(&probe));
    let scheduler = Scheduler::new(settings, launcher)?;

    let mut handles = Vec::with_capacity(targets.len());
    for target in &targets {
        match scheduler.register_with_interval(&target.host, target.interval) {
            Ok(handle) => handles.push(handle),
            Err(e) => warn!(host = %target.host, error = %e, "target rejected"),
        }
    }
    if handles.is_empty() {
        bail!("every target was rejected");
    }

    info!(
        targets = handles.len(),
        program = %probe.program,
        max_children = scheduler.settings().max_children,
        "targets registered"
    );
    Ok(Monitor { scheduler, handles })
}
