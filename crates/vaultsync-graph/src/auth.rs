//! Token storage and the auth provider adapter
//!
//! Interactive sign-in happens outside VaultSync; tokens obtained elsewhere
//! are imported into the OS keyring and refreshed from there.
//!
//! ## Components
//!
//! - [`TokenStorage`] - Load/store/clear seam for persisted tokens
//! - [`KeyringTokenStorage`] - Secure token storage using the system keyring
//! - [`TokenRefresher`] - OAuth2 refresh-token grant via the `oauth2` crate
//! - [`KeyringAuthProvider`] - The [`IAuthProvider`] adapter

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use oauth2::{
    basic::BasicClient, ClientId, EndpointNotSet, EndpointSet, RefreshToken, Scope, TokenResponse,
    TokenUrl,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vaultsync_core::ports::{AuthStatus, IAuthProvider, Tokens};

/// Microsoft OAuth2 token endpoint (consumers tenant)
const TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "vaultsync";

/// Scopes requested on refresh
const DEFAULT_SCOPES: &[&str] = &["Files.ReadWrite.AppFolder", "offline_access"];

// ============================================================================
// TokenStorage
// ============================================================================

/// Persistence seam for OAuth tokens
pub trait TokenStorage: Send + Sync {
    /// `Ok(None)` when nothing is stored
    fn load(&self) -> Result<Option<Tokens>>;
    fn store(&self, tokens: &Tokens) -> Result<()>;
    /// Removing absent tokens is not an error
    fn clear(&self) -> Result<()>;
}

/// Stores and retrieves OAuth tokens from the system keyring
///
/// Tokens are serialized as JSON under the service name "vaultsync" with
/// the configured account as the username.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    account: String,
}

impl KeyringTokenStorage {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .context("Failed to create keyring entry")
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn load(&self) -> Result<Option<Tokens>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(account = %self.account, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account = %self.account, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn store(&self, tokens: &Tokens) -> Result<()> {
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;
        debug!(account = %self.account, "Stored tokens in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(account = %self.account, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// TokenRefresher
// ============================================================================

/// Refresh-token grant against the Microsoft identity platform
pub struct TokenRefresher {
    client:
        BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
}

impl TokenRefresher {
    /// Creates a refresher for the given application (client) id
    pub fn new(app_id: impl Into<String>) -> Result<Self> {
        Self::with_token_url(app_id, TOKEN_URL)
    }

    /// Creates a refresher against a custom token endpoint
    pub fn with_token_url(app_id: impl Into<String>, token_url: &str) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(app_id.into()))
            .set_token_uri(TokenUrl::new(token_url.to_string()).context("Invalid token URL")?);
        Ok(Self {
            client,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Exchanges a refresh token for fresh tokens
    ///
    /// Keeps the old refresh token when the server does not rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        info!("Refreshing access token");

        let http_client = reqwest::Client::new();
        let refresh_token_value = RefreshToken::new(refresh_token.to_string());
        let mut request = self.client.exchange_refresh_token(&refresh_token_value);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let token_result = request
            .request_async(&http_client)
            .await
            .context("Failed to refresh token")?;

        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        })
    }
}

// ============================================================================
// KeyringAuthProvider
// ============================================================================

/// [`IAuthProvider`] backed by stored tokens
///
/// Returns the stored access token while valid and refreshes it when it is
/// expired but still refreshable. Refreshes are serialized so concurrent
/// transfers do not each hit the token endpoint.
pub struct KeyringAuthProvider {
    storage: Arc<dyn TokenStorage>,
    refresher: Option<TokenRefresher>,
    refresh_lock: Mutex<()>,
}

impl KeyringAuthProvider {
    /// `app_id` enables refresh; without it expired tokens are unusable
    pub fn new(storage: Arc<dyn TokenStorage>, app_id: Option<&str>) -> Result<Self> {
        let refresher = app_id.map(TokenRefresher::new).transpose()?;
        Ok(Self::with_refresher(storage, refresher))
    }

    pub fn with_refresher(
        storage: Arc<dyn TokenStorage>,
        refresher: Option<TokenRefresher>,
    ) -> Self {
        Self {
            storage,
            refresher,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Stores externally obtained tokens
    pub fn import(&self, tokens: &Tokens) -> Result<()> {
        self.storage.store(tokens)
    }

    /// Removes the stored tokens
    pub fn sign_out(&self) -> Result<()> {
        self.storage.clear()
    }
}

#[async_trait::async_trait]
impl IAuthProvider for KeyringAuthProvider {
    async fn acquire_token(&self) -> Result<String> {
        let Some(tokens) = self.storage.load()? else {
            bail!("Not signed in");
        };

        match tokens.status_at(Utc::now()) {
            AuthStatus::Authenticated => Ok(tokens.access_token),
            AuthStatus::ExpiredRefreshable => {
                let _guard = self.refresh_lock.lock().await;

                // Another caller may have refreshed while we waited.
                if let Some(current) = self.storage.load()? {
                    if !current.is_expired() {
                        return Ok(current.access_token);
                    }
                }

                let Some(refresher) = &self.refresher else {
                    bail!("Access token expired and no app id is configured for refresh");
                };
                let refresh_token = tokens.refresh_token.as_deref().unwrap_or_default();
                let fresh = refresher.refresh(refresh_token).await?;
                self.storage.store(&fresh)?;
                Ok(fresh.access_token)
            }
            AuthStatus::Expired | AuthStatus::NotAuthenticated => {
                bail!("Session expired; sign in again")
            }
        }
    }

    async fn status(&self) -> AuthStatus {
        match self.storage.load() {
            Ok(Some(tokens)) => tokens.status_at(Utc::now()),
            Ok(None) => AuthStatus::NotAuthenticated,
            Err(e) => {
                warn!(error = %e, "Could not read stored tokens");
                AuthStatus::NotAuthenticated
            }
        }
    }
}
