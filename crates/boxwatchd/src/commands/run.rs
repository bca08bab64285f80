//! `boxwatchd run`: probe until Ctrl-C.

use tokio::sync::watch;
use tracing::{error, info, warn};

use boxwatch_core::HostStatus;
use boxwatch_health::TargetHandle;

use crate::setup::{self, Monitor, TargetArgs};

pub async fn run(args: &TargetArgs) -> anyhow::Result<()> {
    let Monitor { scheduler, handles } = setup::build(args)?;

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────
    let scheduler_handle = scheduler.spawn(shutdown_rx.clone());
    let watchers: Vec<_> = handles
        .into_iter()
        .map(|handle| tokio::spawn(watch_target(handle, shutdown_rx.clone())))
        .collect();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
    }
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let report = scheduler_handle.await?;
    for watcher in watchers {
        let _ = watcher.await;
    }

    info!(
        killed = report.killed,
        reaped = report.reaped,
        "boxwatchd stopped"
    );
    Ok(())
}

/// Log every status change of one target, checked at each completed cycle.
async fn watch_target(handle: TargetHandle, mut shutdown: watch::Receiver<bool>) {
    let mut completions = handle.completions();
    let mut last = handle.status();

    loop {
        tokio::select! {
            changed = completions.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = handle.status();
                if status != last {
                    log_change(handle.hostname(), last, status);
                    last = status;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

fn log_change(host: &str, from: HostStatus, to: HostStatus) {
    if to.is_reachable() {
        info!(host, %from, %to, "host status changed");
    } else {
        warn!(host, %from, %to, "host status changed");
    }
}
