//! Feed configuration.
//!
//! [`FeedConfig`] carries every endpoint, topic, header and timing constant
//! the client needs. [`Default`] reproduces the production values; the
//! `with_*` methods override individual fields.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use round_tracker::FeedConfig;
//!
//! let config = FeedConfig::default()
//!     .with_uid(1234)
//!     .with_max_reconnect_attempts(20)
//!     .with_inactivity_window(Duration::from_secs(60));
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::PacketId;
use crate::transport::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Production feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://game-wss.vshowapi.com/mqtt";

/// Production token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://game-hub.vshowapi.com/auth/getToken";

/// Default account identity.
pub const DEFAULT_UID: u64 = 28_465_485;

/// Default distribution channel sent to the token endpoint.
pub const DEFAULT_CHANNEL: &str = "poppo";

/// Topic carrying the round broadcasts.
pub const DEFAULT_BROADCAST_TOPIC: &str = "goldenflower/broadcast";

/// Topic the join announcement is published to.
pub const DEFAULT_JOIN_TOPIC: &str = "goldenflower/user_join";

/// Join announcement body.
pub const DEFAULT_JOIN_PAYLOAD: &str = r#"{"lang":"en"}"#;

/// Origin presented during the WebSocket upgrade.
pub const DEFAULT_ORIGIN: &str = "https://fun.vshow-play.com";

// ============================================================================
// FeedConfig
// ============================================================================

/// Configuration for one feed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// WebSocket endpoint of the feed.
    pub feed_url: String,

    /// HTTP endpoint issuing access tokens.
    pub token_url: String,

    /// Account identity; used in the token request and identity topics.
    pub uid: u64,

    /// Channel parameter (`c`) of the token request.
    pub channel: String,

    /// Additional token request query pairs.
    pub token_params: Vec<(String, String)>,

    /// Deadline for the token request.
    pub token_timeout: Duration,

    /// Topic carrying round broadcasts.
    pub broadcast_topic: String,

    /// Topic of the join announcement.
    pub join_topic: String,

    /// Body of the join announcement.
    pub join_payload: String,

    /// Headers sent with the WebSocket upgrade request.
    pub headers: Vec<(String, String)>,

    /// Single receive wait in the read loop.
    pub receive_wait: Duration,

    /// Silence after which a keep-alive probe is sent.
    pub inactivity_window: Duration,

    /// Deadline for the probe acknowledgment.
    pub probe_timeout: Duration,

    /// Deadline for opening the WebSocket, TLS included.
    pub open_timeout: Duration,

    /// Deadline for CONNACK and each SUBACK.
    pub ack_timeout: Duration,

    /// Attempts made by the initial connect.
    pub connect_attempts: u32,

    /// Pause between initial connect attempts.
    pub connect_retry_delay: Duration,

    /// Reconnect delay unit; attempt `n` waits `n` units.
    pub reconnect_base_delay: Duration,

    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            uid: DEFAULT_UID,
            channel: DEFAULT_CHANNEL.to_string(),
            token_params: Vec::new(),
            token_timeout: Duration::from_secs(10),
            broadcast_topic: DEFAULT_BROADCAST_TOPIC.to_string(),
            join_topic: DEFAULT_JOIN_TOPIC.to_string(),
            join_payload: DEFAULT_JOIN_PAYLOAD.to_string(),
            headers: default_headers(),
            receive_wait: Duration::from_secs(1),
            inactivity_window: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            open_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
            connect_attempts: 3,
            connect_retry_delay: Duration::from_secs(2),
            reconnect_base_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
        }
    }
}

/// Upgrade headers the feed expects from a browser client.
fn default_headers() -> Vec<(String, String)> {
    [
        ("Origin", DEFAULT_ORIGIN),
        ("Sec-WebSocket-Protocol", "mqtt"),
        ("User-Agent", "Mozilla/5.0"),
        ("Accept-Language", "en-US,en;q=0.9"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}

// ============================================================================
// Builder Methods
// ============================================================================

impl FeedConfig {
    /// Sets the feed endpoint.
    #[inline]
    #[must_use]
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    /// Sets the token endpoint.
    #[inline]
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the account identity.
    #[inline]
    #[must_use]
    pub fn with_uid(mut self, uid: u64) -> Self {
        self.uid = uid;
        self
    }

    /// Sets the token request channel.
    #[inline]
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Adds a token request query pair.
    #[inline]
    #[must_use]
    pub fn with_token_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.token_params.push((name.into(), value.into()));
        self
    }

    /// Adds or replaces an upgrade header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Sets the single receive wait.
    #[inline]
    #[must_use]
    pub fn with_receive_wait(mut self, wait: Duration) -> Self {
        self.receive_wait = wait;
        self
    }

    /// Sets the inactivity window.
    #[inline]
    #[must_use]
    pub fn with_inactivity_window(mut self, window: Duration) -> Self {
        self.inactivity_window = window;
        self
    }

    /// Sets the probe deadline.
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the transport open deadline.
    #[inline]
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets the CONNACK / SUBACK deadline.
    #[inline]
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Sets the initial connect attempt cap and the pause between attempts.
    #[inline]
    #[must_use]
    pub fn with_connect_attempts(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_retry_delay = retry_delay;
        self
    }

    /// Sets the reconnect delay unit.
    #[inline]
    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Sets the reconnect attempt cap.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl FeedConfig {
    /// Subscriptions in the order they are issued, with their packet ids.
    #[must_use]
    pub fn topics(&self) -> Vec<(PacketId, String)> {
        vec![
            (PacketId::new(1), self.broadcast_topic.clone()),
            (PacketId::new(2), format!("goldenflower/{}", self.uid)),
            (PacketId::new(3), format!("global/{}", self.uid)),
        ]
    }

    /// Reconnect schedule.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_base_delay, self.max_reconnect_attempts)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unparsable endpoints, zero attempt caps,
    /// zero deadlines, or an inactivity window not longer than the receive
    /// wait.
    pub fn validate(&self) -> Result<()> {
        let feed = Url::parse(&self.feed_url)
            .map_err(|e| Error::config(format!("invalid feed url '{}': {e}", self.feed_url)))?;
        if !matches!(feed.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "feed url must use ws or wss, got '{}'",
                feed.scheme()
            )));
        }

        let token = Url::parse(&self.token_url)
            .map_err(|e| Error::config(format!("invalid token url '{}': {e}", self.token_url)))?;
        if !matches!(token.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "token url must use http or https, got '{}'",
                token.scheme()
            )));
        }

        if self.broadcast_topic.is_empty() || self.join_topic.is_empty() {
            return Err(Error::config("topics must not be empty"));
        }

        if self.connect_attempts == 0 {
            return Err(Error::config("connect attempts must be greater than zero"));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(Error::config("reconnect attempts must be greater than zero"));
        }

        for (name, value) in [
            ("receive wait", self.receive_wait),
            ("probe timeout", self.probe_timeout),
            ("open timeout", self.open_timeout),
            ("ack timeout", self.ack_timeout),
            ("token timeout", self.token_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }

        if self.inactivity_window <= self.receive_wait {
            return Err(Error::config(
                "inactivity window must be longer than the receive wait",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.feed_url, "wss://game-wss.vshowapi.com/mqtt");
        assert_eq!(config.receive_wait, Duration::from_secs(1));
        assert_eq!(config.inactivity_window, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.open_timeout, Duration::from_secs(10));
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_topics_follow_uid() {
        let topics = FeedConfig::default().with_uid(42).topics();
        assert_eq!(
            topics,
            vec![
                (PacketId::new(1), "goldenflower/broadcast".to_string()),
                (PacketId::new(2), "goldenflower/42".to_string()),
                (PacketId::new(3), "global/42".to_string()),
            ]
        );
    }

    #[test]
    fn test_default_headers() {
        let config = FeedConfig::default();
        assert!(
            config
                .headers
                .iter()
                .any(|(name, value)| name == "Sec-WebSocket-Protocol" && value == "mqtt")
        );
        assert!(config.headers.iter().any(|(name, _)| name == "Origin"));
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let config = FeedConfig::default().with_header("user-agent", "tracker/1.0");
        let agents: Vec<_> = config
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
            .collect();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].1, "tracker/1.0");
    }

    #[test]
    fn test_builder_chain() {
        let config = FeedConfig::default()
            .with_token_param("l", "en")
            .with_connect_attempts(5, Duration::from_secs(1))
            .with_reconnect_base_delay(Duration::from_secs(2))
            .with_max_reconnect_attempts(4);

        assert_eq!(config.token_params, vec![("l".to_string(), "en".to_string())]);
        assert_eq!(config.connect_attempts, 5);
        let policy = config.reconnect_policy();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(3), Duration::from_secs(6));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(FeedConfig::default().with_feed_url("not a url").validate().is_err());
        assert!(
            FeedConfig::default()
                .with_feed_url("https://example.com/mqtt")
                .validate()
                .is_err()
        );
        assert!(
            FeedConfig::default()
                .with_token_url("ftp://example.com")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_cap = FeedConfig::default().with_max_reconnect_attempts(0);
        assert!(matches!(zero_cap.validate(), Err(Error::Config { .. })));

        let zero_connect = FeedConfig::default().with_connect_attempts(0, Duration::from_secs(1));
        assert!(zero_connect.validate().is_err());

        let zero_probe = FeedConfig::default().with_probe_timeout(Duration::ZERO);
        assert!(zero_probe.validate().is_err());

        let zero_open = FeedConfig::default().with_open_timeout(Duration::ZERO);
        assert!(zero_open.validate().is_err());
    }

    #[test]
    fn test_validate_inactivity_window() {
        let config = FeedConfig::default()
            .with_receive_wait(Duration::from_secs(5))
            .with_inactivity_window(Duration::from_secs(5));
        assert!(config.validate().is_err());
    }
}
