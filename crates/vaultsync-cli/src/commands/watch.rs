//! Watch command - long-running mode
//!
//! Starts the file watcher on the vault root and feeds its events, after
//! debouncing, into the engine's pending diff. A sync runs right away and
//! then every `sync.poll_interval` seconds. SIGINT or SIGTERM cancels a
//! [`CancellationToken`] and the loop exits after the current step.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vaultsync_sync::watcher::DebouncedChangeQueue;
use vaultsync_sync::{FileWatcher, SyncEngine};

use super::CliContext;
use crate::output::{get_formatter, print_report};

/// How often the debounce queue is drained
const FLUSH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Override sync.poll_interval (seconds)
    #[arg(long)]
    pub interval: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);
        let engine = ctx.open_engine().await?;

        let poll_secs = self.interval.unwrap_or(ctx.config.sync.poll_interval).max(1);
        let debounce = Duration::from_secs(ctx.config.sync.debounce_delay);

        let (mut watcher, mut events) = FileWatcher::new(ctx.config.vault_root())?;
        watcher.start()?;
        let (uploads, deletions) = engine.rebuild_diff().await?;
        info!(uploads, deletions, "Initial scan complete");

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(signal_token).await;
        });

        fmt.success(&format!(
            "Watching {} (sync every {poll_secs}s, Ctrl+C to stop)",
            ctx.config.vault_root().display()
        ));

        let mut queue = DebouncedChangeQueue::new(debounce);
        let mut poll = tokio::time::interval(Duration::from_secs(poll_secs));
        let mut flush = tokio::time::interval(FLUSH_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                Some(event) = events.recv() => queue.push(event),
                _ = flush.tick() => drain(&engine, &mut queue).await,
                _ = poll.tick() => {
                    // Changes seen so far go into this run.
                    drain(&engine, &mut queue).await;
                    match engine.sync().await {
                        Ok(report) => print_report(&*fmt, ctx.format, "sync", &report),
                        Err(e) => {
                            error!(error = %e, "Sync run failed");
                            fmt.error(&e.to_string());
                        }
                    }
                }
            }
        }

        watcher.stop()?;
        info!("Watch loop terminated");
        Ok(())
    }
}

async fn drain(engine: &SyncEngine, queue: &mut DebouncedChangeQueue) {
    for event in queue.poll() {
        if let Err(e) = engine.handle_fs_event(event).await {
            warn!(error = %e, "Could not apply change event");
        }
    }
}

/// Waits for SIGTERM or SIGINT and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}
