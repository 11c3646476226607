//! Auth commands - import, status and logout
//!
//! Sign-in happens outside VaultSync. `import` stores tokens obtained
//! elsewhere in the system keyring; the engine refreshes them from there.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use tracing::info;

use vaultsync_core::ports::{IAuthProvider, Tokens};
use vaultsync_graph::auth::{KeyringTokenStorage, TokenStorage};

use super::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store externally obtained tokens in the system keyring
    Import {
        /// JSON file with access_token, refresh_token and expires_at ("-" for stdin)
        #[arg(long, conflicts_with = "access_token")]
        file: Option<PathBuf>,

        /// Bearer access token
        #[arg(long)]
        access_token: Option<String>,

        /// Refresh token, enables automatic renewal
        #[arg(long, requires = "access_token")]
        refresh_token: Option<String>,

        /// Seconds until the access token expires
        #[arg(long, default_value_t = 3600, requires = "access_token")]
        expires_in: i64,
    },
    /// Check authentication status
    Status,
    /// Remove stored credentials
    Logout,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            AuthCommand::Import {
                file,
                access_token,
                refresh_token,
                expires_in,
            } => {
                let tokens = match (file, access_token) {
                    (Some(path), _) => read_tokens(path)?,
                    (None, Some(access_token)) => Tokens {
                        access_token: access_token.clone(),
                        refresh_token: refresh_token.clone(),
                        expires_at: Utc::now() + Duration::seconds(*expires_in),
                    },
                    (None, None) => bail!("Pass --file or --access-token"),
                };
                import(ctx, &tokens)
            }
            AuthCommand::Status => status(ctx).await,
            AuthCommand::Logout => logout(ctx),
        }
    }
}

fn read_tokens(path: &Path) -> Result<Tokens> {
    let json = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read tokens from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&json).context("Token file is not valid JSON of the expected shape")
}

fn import(ctx: &CliContext, tokens: &Tokens) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    if tokens.access_token.trim().is_empty() {
        bail!("Access token is empty");
    }

    ctx.auth_provider()?
        .import(tokens)
        .context("Failed to store tokens in keyring")?;
    info!(account = %ctx.config.auth.account, "Imported tokens");

    fmt.success(&format!(
        "Tokens stored for account '{}' (expires {})",
        ctx.config.auth.account,
        tokens.expires_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if tokens.refresh_token.is_some() && ctx.config.auth.app_id.is_none() {
        fmt.warn("auth.app_id is not set; the refresh token cannot be used");
    }
    Ok(())
}

async fn status(ctx: &CliContext) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    let account = &ctx.config.auth.account;
    let stored = KeyringTokenStorage::new(account.clone()).load()?;
    let status = ctx.auth_provider()?.status().await;

    if ctx.format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({
            "account": account,
            "status": status,
            "expires_at": stored.as_ref().map(|t| t.expires_at.to_rfc3339()),
            "refreshable": stored.as_ref().is_some_and(|t| t.refresh_token.is_some()),
        }));
        return Ok(());
    }

    match stored {
        None => fmt.warn(&format!("No tokens stored for account '{account}'")),
        Some(tokens) => {
            if status.allows_sync() {
                fmt.success(&format!("Account '{account}': {status}"));
            } else {
                fmt.warn(&format!("Account '{account}': {status}"));
            }
            fmt.info(&format!(
                "Expires: {}",
                tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            fmt.info(&format!(
                "Refresh: {}",
                if tokens.refresh_token.is_some() { "available" } else { "none" }
            ));
        }
    }
    Ok(())
}

fn logout(ctx: &CliContext) -> Result<()> {
    let fmt = get_formatter(ctx.format);
    ctx.auth_provider()?
        .sign_out()
        .context("Failed to clear tokens from keyring")?;
    info!(account = %ctx.config.auth.account, "Signed out");
    fmt.success("Signed out");
    Ok(())
}
