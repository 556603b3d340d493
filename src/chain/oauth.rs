//! OAuth password-grant authentication for STRATO nodes.
//!
//! The node sits behind an OpenID Connect provider. We discover the token
//! endpoint once from the discovery document, then keep a cached access
//! token and refresh it shortly before expiry. Credentials come from
//! environment variables and never appear in config files or logs.

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::sync::RwLock;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Refresh the token this many seconds before its reported expiry.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 10;

const HTTP_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// OpenID Connect discovery document. Only the token endpoint matters here.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    token_endpoint: Option<String>,
}

/// Response from the token endpoint (password grant).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    /// Token lifetime in seconds. Providers that omit it get an hour.
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Response from `GET /strato/v2.3/key`.
#[derive(Debug, Deserialize)]
struct KeyResponse {
    #[serde(default)]
    address: Option<String>,
}

// ---------------------------------------------------------------------------
// Token cache
// ---------------------------------------------------------------------------

/// A cached access token with its absolute expiry (unix seconds).
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl CachedToken {
    /// Whether the token is within the refresh margin of its expiry.
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at - TOKEN_EXPIRY_MARGIN_SECS
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OAuth client for STRATO node authentication.
///
/// No `Debug` impl: the struct holds the account password and client
/// secret, which must not reach log output.
pub struct OAuthClient {
    http: Client,
    discovery_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    token_endpoint: RwLock<Option<String>>,
    token: RwLock<Option<CachedToken>>,
}

impl OAuthClient {
    /// Create a client from environment variables.
    ///
    /// Requires `OAUTH_DISCOVERY_URL`, `OAUTH_CLIENT_ID`,
    /// `OAUTH_CLIENT_SECRET`, `USERNAME`, and `PASSWORD`. All missing
    /// variables are reported in one error so a fresh deployment can fix
    /// its environment in a single pass.
    pub fn from_env() -> Result<Self> {
        let discovery_url = std::env::var("OAUTH_DISCOVERY_URL").ok();
        let client_id = std::env::var("OAUTH_CLIENT_ID").ok();
        let client_secret = std::env::var("OAUTH_CLIENT_SECRET").ok();
        let username = std::env::var("USERNAME").ok();
        let password = std::env::var("PASSWORD").ok();

        let mut missing = Vec::new();
        if discovery_url.is_none() {
            missing.push("OAUTH_DISCOVERY_URL");
        }
        if client_id.is_none() {
            missing.push("OAUTH_CLIENT_ID");
        }
        if client_secret.is_none() {
            missing.push("OAUTH_CLIENT_SECRET");
        }
        if username.is_none() {
            missing.push("USERNAME");
        }
        if password.is_none() {
            missing.push("PASSWORD");
        }
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        Self::with_credentials(
            discovery_url.unwrap_or_default(),
            client_id.unwrap_or_default(),
            client_secret.unwrap_or_default(),
            username.unwrap_or_default(),
            password.unwrap_or_default(),
        )
    }

    /// Create a client with explicit credentials (for testing).
    pub fn with_credentials(
        discovery_url: String,
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent("STRATARB/0.1.0 (amm-arbitrage-engine)")
            .build()
            .context("Failed to build HTTP client for OAuth")?;

        Ok(Self {
            http,
            discovery_url,
            client_id,
            client_secret,
            username,
            password,
            token_endpoint: RwLock::new(None),
            token: RwLock::new(None),
        })
    }

    // -- Authentication ----------------------------------------------------

    /// Get a valid access token, refreshing if the cached one is near expiry.
    pub async fn access_token(&self) -> Result<String> {
        {
            let guard = self.token.read().unwrap();
            if let Some(ref cached) = *guard {
                if !cached.is_expired(Utc::now().timestamp()) {
                    return Ok(cached.access_token.clone());
                }
            }
        }
        self.refresh_token().await
    }

    /// Request a new access token via the password grant.
    async fn refresh_token(&self) -> Result<String> {
        let token_endpoint = self.ensure_token_endpoint().await?;

        debug!("Requesting OAuth access token...");

        let resp = self
            .http
            .post(&token_endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .context("OAuth token request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let message = Self::error_description(resp).await;
            anyhow::bail!("OAuth token request rejected {status}: {message}");
        }

        let token: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse OAuth token response")?;

        let access_token = token
            .access_token
            .context("No access token in OAuth response")?;
        let expires_at = Utc::now().timestamp() + token.expires_in;

        {
            let mut guard = self.token.write().unwrap();
            *guard = Some(CachedToken {
                access_token: access_token.clone(),
                expires_at,
            });
        }

        info!("OAuth access token refreshed");
        Ok(access_token)
    }

    /// Get the token endpoint, running discovery on first use.
    async fn ensure_token_endpoint(&self) -> Result<String> {
        {
            let guard = self.token_endpoint.read().unwrap();
            if let Some(ref endpoint) = *guard {
                return Ok(endpoint.clone());
            }
        }

        info!("Discovering OAuth token endpoint...");

        let resp = self
            .http
            .get(&self.discovery_url)
            .send()
            .await
            .context("OAuth discovery request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OAuth discovery failed {status}: {body}");
        }

        let doc: DiscoveryDocument = resp
            .json()
            .await
            .context("Failed to parse OAuth discovery document")?;

        let endpoint = doc
            .token_endpoint
            .context("Token endpoint not found in discovery document")?;

        {
            let mut guard = self.token_endpoint.write().unwrap();
            *guard = Some(endpoint.clone());
        }

        info!(endpoint = %endpoint, "OAuth token endpoint discovered");
        Ok(endpoint)
    }

    /// Pull a human-readable message out of a failed token response.
    async fn error_description(resp: reqwest::Response) -> String {
        match resp.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => "unknown error".to_string(),
        }
    }

    // -- Account -----------------------------------------------------------

    /// Fetch the account address bound to these credentials.
    ///
    /// The address never changes for a given identity, so callers fetch it
    /// once at startup and hold it.
    pub async fn fetch_account_address(&self, node_url: &str) -> Result<String> {
        let access_token = self.access_token().await?;

        let resp = self
            .http
            .get(format!("{node_url}/strato/v2.3/key"))
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .context("STRATO key request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("STRATO key lookup failed {status}: {body}");
        }

        let key: KeyResponse = resp
            .json()
            .await
            .context("Failed to parse STRATO key response")?;

        let address = key.address.context("No address in STRATO key response")?;

        info!(address = %address, "STRATO account address retrieved");
        Ok(address)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
