//! Authentication provider port
//!
//! The sync engine never performs sign-in itself. It asks the provider for
//! its [`AuthStatus`] before every top-level operation and for a bearer
//! credential before every remote request.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a refresh token stays usable after the access token expired
pub const REFRESH_WINDOW_HOURS: i64 = 23;

/// OAuth tokens held by an auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Classify these tokens at instant `now`
    ///
    /// - valid access token → `Authenticated`
    /// - expired, refresh token present and still inside the refresh
    ///   window → `ExpiredRefreshable`
    /// - otherwise → `Expired`
    pub fn status_at(&self, now: DateTime<Utc>) -> AuthStatus {
        if !self.is_expired_at(now) {
            return AuthStatus::Authenticated;
        }
        let refresh_deadline = self.expires_at + Duration::hours(REFRESH_WINDOW_HOURS);
        if self.refresh_token.is_some() && refresh_deadline > now {
            AuthStatus::ExpiredRefreshable
        } else {
            AuthStatus::Expired
        }
    }
}

/// Authentication status reported by an [`IAuthProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    NotAuthenticated,
    Expired,
    ExpiredRefreshable,
    Authenticated,
}

impl AuthStatus {
    /// Whether a top-level sync operation may start
    ///
    /// `ExpiredRefreshable` is allowed: the first `acquire_token` call
    /// refreshes the credential.
    pub fn allows_sync(&self) -> bool {
        matches!(
            self,
            AuthStatus::Authenticated | AuthStatus::ExpiredRefreshable
        )
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthStatus::NotAuthenticated => "not authenticated",
            AuthStatus::Expired => "expired",
            AuthStatus::ExpiredRefreshable => "expired (refreshable)",
            AuthStatus::Authenticated => "authenticated",
        };
        write!(f, "{s}")
    }
}

/// Source of bearer credentials
#[async_trait::async_trait]
pub trait IAuthProvider: Send + Sync {
    /// Return a bearer token usable right now
    ///
    /// # Errors
    /// Fails when no credential is stored, or when it expired and cannot
    /// be refreshed
    async fn acquire_token(&self) -> Result<String>;

    /// Current authentication status
    async fn status(&self) -> AuthStatus;
}
