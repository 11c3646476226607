//! Ignore commands - inspect and change the ignore patterns

use anyhow::{bail, Result};
use clap::Subcommand;

use vaultsync_core::domain::ignore::validate_patterns;

use super::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum IgnoreCommand {
    /// Show the patterns in effect
    List,
    /// Validate patterns without saving them
    Check {
        /// Regular expressions matched anywhere in a vault-relative path
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Replace the saved patterns and recompute pending work
    Set {
        /// Regular expressions; pass none to clear the saved patterns
        patterns: Vec<String>,
    },
}

impl IgnoreCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            IgnoreCommand::List => list(ctx).await,
            IgnoreCommand::Check { patterns } => check(ctx, patterns),
            IgnoreCommand::Set { patterns } => set(ctx, patterns).await,
        }
    }
}

async fn list(ctx: &CliContext) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    let engine = ctx.open_engine().await?;
    let patterns = engine.status().await?.ignore_patterns;

    if ctx.format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({ "patterns": patterns }));
    } else if patterns.is_empty() {
        fmt.info("No ignore patterns");
    } else {
        for pattern in &patterns {
            fmt.info(pattern);
        }
    }
    Ok(())
}

fn check(ctx: &CliContext, patterns: &[String]) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    let errors = validate_patterns(patterns);

    if ctx.format == OutputFormat::Json {
        let invalid: Vec<serde_json::Value> = errors
            .iter()
            .map(|(index, err)| serde_json::json!({"index": index, "error": err.to_string()}))
            .collect();
        fmt.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "invalid": invalid,
        }));
    } else if errors.is_empty() {
        fmt.success(&format!("{} pattern(s) valid", patterns.len()));
    } else {
        for (index, err) in &errors {
            fmt.error(&format!("patterns[{index}]: {err}"));
        }
    }

    if !errors.is_empty() {
        bail!("{} invalid pattern(s)", errors.len());
    }
    Ok(())
}

async fn set(ctx: &CliContext, patterns: &[String]) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    let engine = ctx.open_engine().await?;

    let stored = engine.update_ignore_patterns(patterns.to_vec()).await?;
    let pending = engine.pending().await.map(|diff| diff.counts());

    if ctx.format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({
            "patterns": stored,
            "pending": pending.map(|(uploads, deletions)| serde_json::json!({
                "uploads": uploads,
                "deletions": deletions,
            })),
        }));
    } else {
        fmt.success(&format!("Saved {} ignore pattern(s)", stored.len()));
        if let Some((uploads, deletions)) = pending {
            fmt.info(&format!("Pending: {uploads} to upload, {deletions} to delete"));
        }
    }
    Ok(())
}
