//! Transfer commands: `pull`, `push`, `sync` and `clone`
//!
//! Each one opens the engine, runs a single operation and prints its
//! summary. A refused operation prints the reason and exits cleanly.

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use vaultsync_sync::SyncReport;

use super::CliContext;
use crate::output::{get_formatter, print_report};

/// Which engine operation a transfer command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Pull,
    Push,
    Sync,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Pull => "pull",
            Operation::Push => "push",
            Operation::Sync => "sync",
        }
    }

    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let engine = ctx.open_engine().await?;
        info!(operation = self.name(), "Running");

        let report = match self {
            Operation::Pull => engine.pull().await?,
            Operation::Push => engine.push().await?,
            Operation::Sync => engine.sync().await?,
        };
        finish(ctx, self.name(), &report)
    }
}

/// Direction of a clone
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CloneTarget {
    /// Replace the local vault with the OneDrive copy
    Local,
    /// Replace the OneDrive copy with the local vault
    Remote,
}

#[derive(Debug, Args)]
pub struct CloneCommand {
    /// Side that gets overwritten
    #[arg(long, value_enum)]
    pub to: CloneTarget,

    /// Confirm that the destination's current content may be deleted
    #[arg(long)]
    pub yes: bool,
}

impl CloneCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);
        if !self.yes {
            let side = match self.to {
                CloneTarget::Local => "the local vault",
                CloneTarget::Remote => "the OneDrive copy",
            };
            fmt.error(&format!(
                "Cloning replaces everything in {side}. Re-run with --yes to continue."
            ));
            bail!("clone not confirmed");
        }

        let engine = ctx.open_engine().await?;
        let report = match self.to {
            CloneTarget::Local => engine.clone_to_local().await?,
            CloneTarget::Remote => engine.clone_to_remote().await?,
        };
        finish(ctx, "clone", &report)
    }
}

fn finish(ctx: &CliContext, operation: &str, report: &SyncReport) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    print_report(&*fmt, ctx.format, operation, report);
    if report.is_refused() {
        bail!("{operation} refused");
    }
    Ok(())
}
