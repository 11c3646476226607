//! Microsoft Graph API client
//!
//! Typed HTTP client scoped to the signed-in user's drive. Every
//! authenticated request asks the [`IAuthProvider`] for a bearer token,
//! carries `Cache-Control: no-cache` and is retried on HTTP 429.
//!
//! ## Addressing
//!
//! Items are addressed by path under the application folder:
//!
//! ```text
//! {base}/special/approot:/Vault/notes/today.md            item
//! {base}/special/approot:/Vault/notes/today.md:/content   item + action
//! {base}/special/approot/children                         app folder children
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultsync_graph::client::GraphClient;
//! # use vaultsync_core::ports::IAuthProvider;
//!
//! # async fn example(auth: Arc<dyn IAuthProvider>) -> anyhow::Result<()> {
//! let client = GraphClient::new(auth);
//! let url = client.item_url("Vault/notes/today.md", Some("content"))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};
use url::Url;
use vaultsync_core::ports::IAuthProvider;

use crate::GraphError;

/// Base URL of the signed-in user's drive
pub const GRAPH_DRIVE_URL: &str = "https://graph.microsoft.com/v1.0/me/drive";

/// Path of the application folder relative to the drive
pub const APP_ROOT: &str = "/special/approot";

/// Default retry-after duration when header is missing (30 seconds)
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Maximum number of retries for 429 responses
const DEFAULT_MAX_RETRIES: u32 = 5;

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph drive calls
///
/// Cheap to clone; clones share the connection pool and auth provider.
#[derive(Clone)]
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Drive base URL
    base_url: String,
    /// Source of bearer tokens
    auth: Arc<dyn IAuthProvider>,
    /// Retries allowed after a 429
    max_retries: u32,
}

impl GraphClient {
    /// Creates a client for the production Graph endpoint
    pub fn new(auth: Arc<dyn IAuthProvider>) -> Self {
        Self::with_base_url(auth, GRAPH_DRIVE_URL)
    }

    /// Creates a client with a custom drive base URL (useful for testing)
    pub fn with_base_url(auth: Arc<dyn IAuthProvider>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the number of 429 retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the drive base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the application folder itself, e.g. for `/delta` or `/children`
    pub fn app_root_url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, APP_ROOT, suffix)
    }

    /// URL of the item at `path` under the application folder
    ///
    /// Each path segment is percent-encoded. With `Some(action)` the action
    /// is appended in path-addressing form (`…/name:/action`).
    pub fn item_url(&self, path: &str, action: Option<&str>) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid drive base URL: {}", self.base_url))?;

        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Drive base URL cannot carry a path: {}", self.base_url))?;
            segments.pop_if_empty().push("special").push("approot:");
            for (i, part) in parts.iter().enumerate() {
                if action.is_some() && i + 1 == parts.len() {
                    segments.push(&format!("{part}:"));
                } else {
                    segments.push(part);
                }
            }
            if let Some(action) = action {
                segments.push(action);
            }
        }

        Ok(url.into())
    }

    /// Creates an authenticated request builder for an absolute URL
    ///
    /// Adds the Authorization and `Cache-Control: no-cache` headers.
    pub async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self
            .auth
            .acquire_token()
            .await
            .context("Failed to acquire access token")?;

        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header(header::CACHE_CONTROL, "no-cache"))
    }

    /// Executes an authenticated request with automatic 429 retry.
    ///
    /// `decorate` is applied to a fresh builder on every attempt, so it
    /// must be able to rebuild the body (headers, JSON, bytes).
    ///
    /// On HTTP 429 the `Retry-After` header is honoured and the request is
    /// retried up to the configured limit.
    ///
    /// # Returns
    /// The HTTP response on any non-429 status. Status classification is
    /// left to the caller (see [`ensure_success`]).
    pub async fn execute_with_retry<F>(
        &self,
        method: Method,
        url: &str,
        decorate: F,
    ) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        for attempt in 0..=self.max_retries {
            let response = decorate(self.request(method.clone(), url).await?)
                .send()
                .await
                .map_err(GraphError::from)
                .with_context(|| format!("{method} {url}"))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 0 {
                    info!(url, attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            let retry_after = retry_after_of(&response);
            if attempt >= self.max_retries {
                warn!(url, attempts = attempt + 1, "429 retry limit exhausted");
                return Err(GraphError::TooManyRequests { retry_after }.into());
            }

            info!(
                url,
                attempt,
                retry_after_ms = retry_after.as_millis() as u64,
                "Received 429, backing off"
            );
            tokio::time::sleep(retry_after).await;
        }

        Err(anyhow!("Request failed: retry loop exited unexpectedly for {url}"))
    }

    /// Executes a request without the Authorization header
    ///
    /// Used for pre-authenticated URLs (download URLs, upload sessions).
    pub async fn execute_unauthenticated<F>(
        &self,
        method: Method,
        url: &str,
        decorate: F,
    ) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        debug!(%method, "Unauthenticated request");
        decorate(self.client.request(method.clone(), url))
            .send()
            .await
            .map_err(GraphError::from)
            .with_context(|| format!("{method} {url}"))
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Status handling
// ============================================================================

/// Maps a non-success response onto a [`GraphError`]
///
/// Successful responses are returned unchanged.
pub async fn ensure_success(response: Response) -> std::result::Result<Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = retry_after_of(&response);
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_string());
    let detail = format!("{status}: {body}");

    Err(match status {
        StatusCode::UNAUTHORIZED => GraphError::Unauthorized(detail),
        StatusCode::FORBIDDEN => GraphError::Forbidden(detail),
        StatusCode::NOT_FOUND => GraphError::NotFound(detail),
        StatusCode::CONFLICT => GraphError::Conflict(detail),
        StatusCode::TOO_MANY_REQUESTS => GraphError::TooManyRequests { retry_after },
        s if s.is_server_error() => GraphError::ServerError(detail),
        _ => GraphError::InvalidResponse(detail),
    })
}

fn retry_after_of(response: &Response) -> Duration {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Parses a `Retry-After` header value
///
/// Accepts delay-seconds or an HTTP-date no more than an hour away. Falls
/// back to `default` for anything else.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            if let Some(secs) = (target - now)
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= 3600)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
