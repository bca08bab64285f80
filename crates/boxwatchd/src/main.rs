//! boxwatchd, the boxwatch daemon.
//!
//! Registers hosts from a config file and/or the command line, then pings
//! them on a fixed cadence under a global concurrency cap.
//!
//! # Usage
//!
//! ```text
//! boxwatchd run --config /etc/boxwatch.toml
//! boxwatchd check --host localhost --host ioc-box-01 --format json
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod report;
mod setup;

use setup::TargetArgs;

#[derive(Parser)]
#[command(
    name = "boxwatchd",
    about = "Ping-based host reachability monitor",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log filter (e.g. "debug", "boxwatch_health=trace"). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe targets until interrupted, logging every status change.
    Run {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Probe every target once, print a report and exit.
    ///
    /// Exits non-zero if any target is not reachable.
    Check {
        #[command(flatten)]
        targets: TargetArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Stop waiting for outstanding targets after this long ("30s", "2m").
        #[arg(long, default_value = "60s")]
        timeout: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "boxwatchd starting");

    match cli.command {
        Command::Run { targets } => {
            commands::run::run(&targets).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check {
            targets,
            format,
            timeout,
        } => {
            let reachable = commands::check::check(&targets, &format, &timeout).await?;
            Ok(if reachable {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
