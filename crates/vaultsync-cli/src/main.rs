//! VaultSync CLI - two-way sync of a local vault with the OneDrive app folder
//!
//! Provides commands for:
//! - Pulling, pushing and syncing changes
//! - Cloning in either direction
//! - Showing status and pending work
//! - Managing ignore patterns
//! - Watching the vault continuously
//! - Importing and inspecting credentials

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand,
    ignore::IgnoreCommand,
    status::StatusCommand,
    sync::{CloneCommand, Operation},
    watch::WatchCommand,
    CliContext,
};
use output::OutputFormat;
use vaultsync_core::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "vaultsync",
    version,
    about = "Two-way sync of a local vault with OneDrive"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply remote changes to the local vault
    Pull,
    /// Send local changes to OneDrive
    Push,
    /// Pull, then push
    Sync,
    /// Overwrite one side with the other
    Clone(CloneCommand),
    /// Show authentication state and pending work
    Status(StatusCommand),
    /// Manage ignore patterns
    #[command(subcommand)]
    Ignore(IgnoreCommand),
    /// Keep syncing until interrupted
    Watch(WatchCommand),
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
}

fn load_config(path: Option<&PathBuf>) -> Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok((config, path.clone()))
        }
        None => {
            let path = Config::default_path();
            Ok((Config::load_or_default(&path), path))
        }
    }
}

fn init_tracing(verbose: u8, configured: &str, format: LogFormat) {
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_ref())?;
    init_tracing(cli.verbose, &config.logging.level, cli.log_format);
    tracing::debug!(config_path = %config_path.display(), "Loaded configuration");

    let ctx = CliContext {
        config,
        config_path,
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
    };

    match cli.command {
        Commands::Pull => Operation::Pull.execute(&ctx).await,
        Commands::Push => Operation::Push.execute(&ctx).await,
        Commands::Sync => Operation::Sync.execute(&ctx).await,
        Commands::Clone(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Ignore(cmd) => cmd.execute(&ctx).await,
        Commands::Watch(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
    }
}
