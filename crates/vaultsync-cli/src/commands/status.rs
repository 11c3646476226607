//! Status command - auth state, cursor and pending work

use anyhow::Result;
use clap::Args;

use vaultsync_sync::EngineStatus;

use super::CliContext;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Skip the local scan; pending counts are then unknown
    #[arg(long)]
    pub no_scan: bool,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);
        let engine = ctx.open_engine().await?;

        if !self.no_scan {
            engine.rebuild_diff().await?;
        }
        let status = engine.status().await?;

        if ctx.format == OutputFormat::Json {
            fmt.print_json(&status_json(ctx, &status));
        } else {
            print_human(&*fmt, ctx, &status);
        }
        Ok(())
    }
}

fn status_json(ctx: &CliContext, status: &EngineStatus) -> serde_json::Value {
    serde_json::json!({
        "vault_root": ctx.config.vault_root(),
        "remote_root": ctx.config.remote_root_name(),
        "state_file": ctx.config.state_path(),
        "auth": status.auth,
        "has_cursor": status.has_cursor,
        "remote_entries": status.remote_entries,
        "pending": status.pending.map(|(uploads, deletions)| serde_json::json!({
            "uploads": uploads,
            "deletions": deletions,
        })),
        "ignore_patterns": status.ignore_patterns,
    })
}

fn print_human(fmt: &dyn OutputFormatter, ctx: &CliContext, status: &EngineStatus) {
    if status.auth.allows_sync() {
        fmt.success(&format!("Signed in ({})", status.auth));
    } else {
        fmt.warn(&format!(
            "Sign in required ({}). Use 'vaultsync auth import'.",
            status.auth
        ));
    }

    fmt.info(&format!("Vault:   {}", ctx.config.vault_root().display()));
    fmt.info(&format!("Remote:  Apps/<app>/{}", ctx.config.remote_root_name()));

    if status.has_cursor {
        fmt.info(&format!("Synced:  {} remote entries known", status.remote_entries));
    } else {
        fmt.info("Synced:  never (run 'vaultsync clone' first)");
    }

    match status.pending {
        Some((0, 0)) => fmt.info("Pending: nothing to push"),
        Some((uploads, deletions)) => fmt.info(&format!(
            "Pending: {uploads} to upload, {deletions} to delete"
        )),
        None => fmt.info("Pending: unknown (not scanned)"),
    }

    fmt.info(&format!("Ignored: {}", status.ignore_patterns.join("  ")));
}
