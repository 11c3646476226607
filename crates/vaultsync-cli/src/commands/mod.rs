//! CLI command implementations
//!
//! Every command receives a [`CliContext`] holding the loaded configuration
//! and the output format, and wires the adapters it needs from it.

pub mod auth;
pub mod ignore;
pub mod status;
pub mod sync;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use vaultsync_cache::JsonStateStore;
use vaultsync_core::config::Config;
use vaultsync_core::ports::INotificationSink;
use vaultsync_graph::auth::{KeyringAuthProvider, KeyringTokenStorage};
use vaultsync_graph::client::GraphClient;
use vaultsync_graph::provider::GraphRemoteDrive;
use vaultsync_sync::{EngineOptions, EnginePorts, LocalVaultAdapter, SyncEngine};

use crate::output::OutputFormat;

/// State shared by every command
pub struct CliContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl CliContext {
    pub fn auth_provider(&self) -> Result<Arc<KeyringAuthProvider>> {
        let storage = Arc::new(KeyringTokenStorage::new(self.config.auth.account.clone()));
        let provider = KeyringAuthProvider::new(storage, self.config.auth.app_id.as_deref())
            .context("Failed to set up the auth provider")?;
        Ok(Arc::new(provider))
    }

    /// Validate the configuration and build a ready engine
    pub async fn open_engine(&self) -> Result<SyncEngine> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!(
                "Invalid configuration in {}:\n  {}",
                self.config_path.display(),
                details.join("\n  ")
            );
        }

        let root = self.config.vault_root();
        if !root.is_dir() {
            bail!("Vault root does not exist: {}", root.display());
        }

        let auth = self.auth_provider()?;
        let remote = Arc::new(GraphRemoteDrive::new(GraphClient::new(auth.clone())));
        let state_path = self.config.state_path();
        info!(
            root = %root.display(),
            state = %state_path.display(),
            "Opening sync engine"
        );

        let ports = EnginePorts {
            auth,
            remote,
            vault: Arc::new(LocalVaultAdapter::new(root)),
            store: Arc::new(JsonStateStore::new(state_path)),
            notifier: Arc::new(ConsoleNotificationSink::new(self.format)),
        };
        let engine = SyncEngine::open(ports, EngineOptions::from_config(&self.config)).await?;
        Ok(engine)
    }
}

/// Prints engine notices as they arrive
///
/// In JSON mode notices only go to the log so stdout stays parseable.
pub struct ConsoleNotificationSink {
    format: OutputFormat,
}

impl ConsoleNotificationSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl INotificationSink for ConsoleNotificationSink {
    fn notify(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("  {message}"),
            OutputFormat::Json => debug!(notice = %message, "Engine notice"),
        }
    }
}
