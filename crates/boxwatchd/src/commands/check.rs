//! `boxwatchd check`: probe every target once and report.

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use boxwatch_core::parse_duration;
use boxwatch_health::TargetHandle;

use crate::report::{self, CheckReport};
use crate::setup::{self, Monitor, TargetArgs};

/// Returns whether every target was reachable.
pub async fn check(args: &TargetArgs, format: &str, timeout: &str) -> anyhow::Result<bool> {
    let deadline = parse_duration(timeout)
        .with_context(|| format!("invalid --timeout {timeout:?}"))?;
    let Monitor { scheduler, handles } = setup::build(args)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = scheduler.spawn(shutdown_rx);

    let complete = tokio::time::timeout(deadline, first_cycle(&handles))
        .await
        .is_ok();
    if !complete {
        warn!(timeout, "deadline passed with targets still outstanding");
    }

    // Taken before the drain so outstanding probes still show their pid.
    let snapshot = scheduler.snapshot();
    let _ = shutdown_tx.send(true);
    let drained = scheduler_handle.await?;
    info!(killed = drained.killed, "check finished");

    let report = CheckReport::new(snapshot, complete);
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print!("{}", report::format_report(&report));
        }
    }

    Ok(report.all_reachable())
}

/// Resolve once every target has completed at least one cycle.
async fn first_cycle(handles: &[TargetHandle]) {
    for handle in handles {
        let mut completions = handle.completions();
        let _ = completions.wait_for(|cycles| *cycles >= 1).await;
    }
}
