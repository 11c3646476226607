//! Configuration module for VaultSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ignore::{sanitize_patterns, validate_patterns};

/// Unit the remote requires chunk sizes to be a multiple of (320 KiB).
pub const CHUNK_UNIT_BYTES: u64 = 327_680;

const MIB: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for VaultSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub ignore: IgnoreConfig,
    pub large_files: LargeFilesConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub state: StateConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local vault root.
    pub root: PathBuf,
    /// Root folder name under the remote app folder. Defaults to the last
    /// component of `root`.
    pub remote_root: Option<String>,
    /// Maximum number of transfers in flight.
    pub concurrency: usize,
    /// Seconds between background sync runs in watch mode.
    pub poll_interval: u64,
    /// Seconds to coalesce watcher events before updating the diff.
    pub debounce_delay: u64,
}

/// Path-exclusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Regular expressions tested anywhere in a vault-relative path.
    pub patterns: Vec<String>,
}

/// Upload sizing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LargeFilesConfig {
    /// Files up to this size (in MiB, inclusive) use a single request.
    pub threshold_mb: u64,
    /// Chunk size for larger files, in 320 KiB units.
    pub chunk_units: u64,
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Azure AD Application (client) ID used for token refresh.
    pub app_id: Option<String>,
    /// Keyring username the tokens are stored under.
    pub account: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Persisted state location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// State file path. `None` selects `<data_dir>/vaultsync/<remote_root>.state.json`.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading and derived values
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.ignore.patterns = sanitize_patterns(&config.ignore.patterns);
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/vaultsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vaultsync")
            .join("config.yaml")
    }

    /// The vault root with a leading `~` expanded to the home directory.
    pub fn vault_root(&self) -> PathBuf {
        expand_tilde(&self.sync.root)
    }

    /// Remote root folder name: `sync.remote_root`, else the vault folder name.
    pub fn remote_root_name(&self) -> String {
        self.sync
            .remote_root
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                self.vault_root()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "Vault".to_string())
    }

    /// Where the persisted state lives.
    pub fn state_path(&self) -> PathBuf {
        match &self.state.path {
            Some(path) => expand_tilde(path),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("vaultsync")
                .join(format!("{}.state.json", self.remote_root_name())),
        }
    }
}

impl LargeFilesConfig {
    /// Single-shot upload limit in bytes.
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_mb.saturating_mul(MIB)
    }

    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_units.saturating_mul(CHUNK_UNIT_BYTES)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Vault"),
            remote_root: None,
            concurrency: 100,
            poll_interval: 300,
            debounce_delay: 2,
        }
    }
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            patterns: vec![r"\.vaultsync".to_string()],
        }
    }
}

impl Default for LargeFilesConfig {
    fn default() -> Self {
        Self {
            threshold_mb: 4,
            chunk_units: 150,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            account: "default".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        // --- sync ---
        positive("sync.concurrency", self.sync.concurrency as u64);
        positive("sync.poll_interval", self.sync.poll_interval);

        // --- large_files ---
        positive("large_files.threshold_mb", self.large_files.threshold_mb);
        positive("large_files.chunk_units", self.large_files.chunk_units);

        // Tilde paths are expanded at runtime.
        let root_str = self.sync.root.to_string_lossy();
        if !root_str.starts_with('~') && !self.sync.root.exists() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", self.sync.root.display()),
            });
        }

        if let Some(name) = &self.sync.remote_root {
            if name.trim().is_empty() || name.contains('/') {
                errors.push(ValidationError {
                    field: "sync.remote_root".into(),
                    message: format!("must be a single non-empty folder name, got '{name}'"),
                });
            }
        }

        // --- ignore ---
        for (index, err) in validate_patterns(&self.ignore.patterns) {
            errors.push(ValidationError {
                field: format!("ignore.patterns[{index}]"),
                message: err.to_string(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use vaultsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/Notes"))
///     .sync_concurrency(16)
///     .ignore_patterns(vec![r"\.git".to_string()])
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_remote_root(mut self, name: impl Into<String>) -> Self {
        self.config.sync.remote_root = Some(name.into());
        self
    }

    pub fn sync_concurrency(mut self, n: usize) -> Self {
        self.config.sync.concurrency = n;
        self
    }

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_debounce_delay(mut self, seconds: u64) -> Self {
        self.config.sync.debounce_delay = seconds;
        self
    }

    // --- ignore ---

    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore.patterns = sanitize_patterns(&patterns);
        self
    }

    // --- large_files ---

    pub fn large_files_threshold_mb(mut self, mb: u64) -> Self {
        self.config.large_files.threshold_mb = mb;
        self
    }

    pub fn large_files_chunk_units(mut self, units: u64) -> Self {
        self.config.large_files.chunk_units = units;
        self
    }

    // --- auth ---

    pub fn auth_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.auth.app_id = Some(app_id.into());
        self
    }

    pub fn auth_account(mut self, account: impl Into<String>) -> Self {
        self.config.auth.account = account.into();
        self
    }

    // --- logging / state ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn state_path(mut self, path: PathBuf) -> Self {
        self.config.state.path = Some(path);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
