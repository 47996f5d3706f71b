//! Access token acquisition.
//!
//! The feed authenticates its CONNECT frame with a short-lived token issued
//! by an HTTP endpoint. [`TokenSource`] abstracts that exchange so the
//! lifecycle can be driven by [`StaticToken`] in tests.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::FeedConfig;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Application-level success code in the token response.
const SUCCESS_CODE: i64 = 200;

// ============================================================================
// TokenSource
// ============================================================================

/// Supplies access tokens for the handshake.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetches a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] or [`Error::Http`] when no token could be
    /// obtained.
    async fn acquire_token(&self) -> Result<String>;
}

// ============================================================================
// StaticToken
// ============================================================================

/// A fixed token, for tests and operators who already hold one.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps `token`.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn acquire_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// HttpTokenSource
// ============================================================================

/// Token endpoint client.
///
/// Sends `GET <token_url>?_uid=<uid>&c=<channel>&<extra pairs>` and expects
/// `{"code": 200, "data": {"mqtt_access_token": "..."}}`.
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpTokenSource {
    /// Builds a client from the feed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the token URL does not parse, and
    /// [`Error::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        let mut url = Url::parse(&config.token_url)
            .map_err(|e| Error::config(format!("invalid token url: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("_uid", &config.uid.to_string());
            query.append_pair("c", &config.channel);
            for (name, value) in &config.token_params {
                query.append_pair(name, value);
            }
        }

        Self::new(url, config.token_timeout)
    }

    /// Builds a client for a fully formed request URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// Request URL including the query string.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn acquire_token(&self) -> Result<String> {
        debug!(host = self.url.host_str().unwrap_or_default(), "Requesting access token");

        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Token endpoint returned an error status");
            return Err(Error::credential(format!("token endpoint returned {status}")));
        }

        let body: TokenResponse = response.json().await?;
        body.into_token()
    }
}

// ============================================================================
// Response Shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(default)]
    mqtt_access_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<String> {
        if self.code != SUCCESS_CODE {
            return Err(Error::credential(format!(
                "token endpoint answered with code {}",
                self.code
            )));
        }
        self.data
            .and_then(|data| data.mqtt_access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::credential("token missing from response"))
    }
}

// ============================================================================
// Tests
// ============================================================================
