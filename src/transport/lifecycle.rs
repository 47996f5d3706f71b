//! Connection lifecycle state machine.
//!
//! [`Lifecycle`] owns the transport and drives it through the handshake,
//! subscriptions, keep-alive probing and bounded reconnection.
//!
//! # States
//!
//! ```text
//! Disconnected ──► Connecting ──► AwaitingHandshakeAck ──► Subscribing ──► Ready
//!                                                                          │
//!             ┌────────────── transport failure / unanswered probe ◄───────┘
//!             ▼
//!  Reconnecting { attempt, delay } ──► Ready          (attempt counter reset)
//!             │
//!             └── attempt > cap ──► GivingUp           (terminal)
//! ```
//!
//! A stop signal observed at any point of connecting, backing off or waiting
//! for an acknowledgment closes the transport and leaves the lifecycle in
//! `Disconnected`. Opening the transport is bounded by `open_timeout`.
//!
//! # Liveness
//!
//! [`Lifecycle::receive_next`] waits at most the configured receive wait.
//! When nothing has arrived for the inactivity window it sends `PINGREQ` and
//! requires `PINGRESP` within the probe deadline. Frames arriving while the
//! lifecycle waits for a specific acknowledgment are buffered and delivered
//! in arrival order by later `receive_next` calls, including after a
//! reconnect; [`Lifecycle::take_buffered`] drains them early. A `PINGREQ`
//! from the peer is answered as soon as it is read.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::protocol::{Frame, decode_frame};

use super::backoff::ReconnectPolicy;
use super::credential::TokenSource;
use super::socket::{Connector, Transport};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Transport being opened.
    Connecting,
    /// CONNECT sent, waiting for CONNACK.
    AwaitingHandshakeAck,
    /// Issuing subscriptions.
    Subscribing,
    /// Receiving broadcasts.
    Ready,
    /// Waiting `delay` before reconnect attempt `attempt`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before this attempt.
        delay: Duration,
    },
    /// Attempt cap reached. Terminal.
    GivingUp,
}

impl ConnectionState {
    /// `true` for `GivingUp`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::GivingUp)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::AwaitingHandshakeAck => f.write_str("awaiting handshake ack"),
            Self::Subscribing => f.write_str("subscribing"),
            Self::Ready => f.write_str("ready"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {attempt}, delay {}ms)", delay.as_millis())
            }
            Self::GivingUp => f.write_str("giving up"),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Owner of the feed connection.
pub struct Lifecycle<C: Connector, S: TokenSource> {
    config: FeedConfig,
    policy: ReconnectPolicy,
    connector: C,
    tokens: S,
    cancel: CancellationToken,
    state: ConnectionState,
    transport: Option<C::Transport>,
    /// Cached access token; cleared when the peer rejects it.
    token: Option<String>,
    /// Frames read while waiting for an acknowledgment.
    pending: VecDeque<Frame>,
    last_activity: Instant,
    reconnect_attempt: u32,
}

// ============================================================================
// Lifecycle - Constructor & Accessors
// ============================================================================

impl<C: Connector, S: TokenSource> Lifecycle<C, S> {
    /// Creates a disconnected lifecycle.
    #[must_use]
    pub fn new(config: FeedConfig, connector: C, tokens: S, cancel: CancellationToken) -> Self {
        let policy = config.reconnect_policy();
        Self {
            config,
            policy,
            connector,
            tokens,
            cancel,
            state: ConnectionState::Disconnected,
            transport: None,
            token: None,
            pending: VecDeque::new(),
            last_activity: Instant::now(),
            reconnect_attempt: 0,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Feed configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Reconnect attempts made since the last successful connection.
    #[inline]
    #[must_use]
    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    /// `true` while an access token is cached.
    #[inline]
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Stop signal observed by this lifecycle.
    #[inline]
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

// ============================================================================
// Lifecycle - Public Operations
// ============================================================================

impl<C: Connector, S: TokenSource> Lifecycle<C, S> {
    /// Runs the initial connect.
    ///
    /// Makes up to `connect_attempts` full attempts, pausing
    /// `connect_retry_delay` between them. An error that no retry can fix
    /// (for example a malformed upgrade header) ends the loop early. Ends in
    /// `Ready` on success and in `GivingUp` once the attempts are spent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectFailed`] when every attempt failed and
    /// [`Error::Cancelled`] if the stop signal fired.
    pub async fn connect(&mut self) -> Result<()> {
        let attempts = self.config.connect_attempts;
        let mut made = 0;
        let mut last_error = None;

        for attempt in 1..=attempts {
            self.check_cancelled().await?;
            made = attempt;

            match self.establish_or_cancel().await {
                Ok(()) => {
                    info!(attempt, "Feed connected");
                    return Ok(());
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(attempt, max = attempts, error = %e, "Connect attempt failed");
                    self.discard_transport().await;
                    let recoverable = e.is_recoverable();
                    last_error = Some(e);
                    if !recoverable {
                        break;
                    }
                    if attempt < attempts {
                        self.sleep_or_cancel(self.config.connect_retry_delay).await?;
                    }
                }
            }
        }

        let message = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        error!(attempts = made, %message, "Initial connect failed");
        self.state = ConnectionState::GivingUp;
        Err(Error::connect_failed(made, message))
    }

    /// Returns the next frame, or `None` if the bounded wait elapsed.
    ///
    /// Buffered frames are returned first. Peer `PINGREQ` frames are answered
    /// here and not returned. Undecodable frames are dropped. When the feed
    /// has been silent for the inactivity window, a keep-alive probe runs
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns a transport failure ([`Error::is_transport_failure`]) when the
    /// connection is unusable.
    pub async fn receive_next(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }

        let wait = self.config.receive_wait;
        let Some(bytes) = self.transport_mut()?.recv_binary(wait).await? else {
            if self.last_activity.elapsed() >= self.config.inactivity_window {
                self.probe().await?;
            }
            return Ok(None);
        };

        self.last_activity = Instant::now();
        match decode_frame(&bytes) {
            Some(Frame::PingRequest) => {
                trace!("Answering peer keep-alive");
                self.send_frame(&Frame::PingResponse).await?;
                Ok(None)
            }
            Some(frame) => Ok(Some(frame)),
            None => {
                trace!(len = bytes.len(), "Undecodable frame discarded");
                Ok(None)
            }
        }
    }

    /// Sends a keep-alive probe and waits for its acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProbeUnanswered`] if no `PINGRESP` arrives within the
    /// probe deadline, or any transport failure met meanwhile.
    pub async fn probe(&mut self) -> Result<()> {
        debug!(
            idle_ms = millis(self.last_activity.elapsed()),
            "Feed idle, sending keep-alive probe"
        );
        self.send_frame(&Frame::PingRequest).await?;

        let deadline = self.config.probe_timeout;
        match self
            .await_frame("keep-alive probe", deadline, |frame| {
                matches!(frame, Frame::PingResponse)
            })
            .await
        {
            Ok(_) => {
                trace!("Keep-alive acknowledged");
                Ok(())
            }
            Err(e) if e.is_timeout() => {
                warn!(timeout_ms = millis(deadline), "Keep-alive probe unanswered");
                Err(Error::probe_unanswered(millis(deadline)))
            }
            Err(e) => Err(e),
        }
    }

    /// Re-establishes the connection after a transport failure.
    ///
    /// Attempt `n` waits `n * base_delay` first. The attempt counter carries
    /// over between calls and resets only on success. Frames buffered before
    /// the failure are kept for `receive_next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReconnectExhausted`] once the cap is exceeded (state
    /// `GivingUp`), or [`Error::Cancelled`] if the stop signal fired.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.discard_transport().await;

        loop {
            if self.state.is_terminal() {
                return Err(Error::reconnect_exhausted(self.policy.max_attempts()));
            }
            self.check_cancelled().await?;

            let attempt = self.reconnect_attempt + 1;
            let Some(delay) = self.policy.next_delay(attempt) else {
                error!(attempts = self.reconnect_attempt, "Reconnect attempts exhausted");
                self.state = ConnectionState::GivingUp;
                return Err(Error::reconnect_exhausted(self.reconnect_attempt));
            };

            self.reconnect_attempt = attempt;
            self.state = ConnectionState::Reconnecting { attempt, delay };
            info!(attempt, delay_ms = millis(delay), "Reconnecting");
            self.sleep_or_cancel(delay).await?;

            match self.establish_or_cancel().await {
                Ok(()) => {
                    info!(attempt, "Reconnected");
                    self.reconnect_attempt = 0;
                    return Ok(());
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                    self.discard_transport().await;
                }
            }
        }
    }

    /// Removes and returns every buffered frame, oldest first.
    pub fn take_buffered(&mut self) -> Vec<Frame> {
        self.pending.drain(..).collect()
    }

    /// Closes the transport and drops buffered frames. Ends in
    /// `Disconnected`.
    pub async fn shutdown(&mut self) {
        self.discard_transport().await;
        self.pending.clear();
        self.state = ConnectionState::Disconnected;
        debug!("Lifecycle shut down");
    }
}

// ============================================================================
// Lifecycle - Handshake
// ============================================================================

impl<C: Connector, S: TokenSource> Lifecycle<C, S> {
    /// Runs [`Self::establish`] until it finishes or the stop signal fires.
    async fn establish_or_cancel(&mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.establish() => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                debug!(state = %self.state, "Stop signal while connecting");
                self.shutdown().await;
                Err(Error::Cancelled)
            }
        }
    }

    /// One full attempt: token, transport, CONNECT, SUBSCRIBEs, join.
    async fn establish(&mut self) -> Result<()> {
        self.discard_transport().await;

        let token = match &self.token {
            Some(token) => token.clone(),
            None => {
                let token = self.tokens.acquire_token().await?;
                debug!("Access token acquired");
                self.token = Some(token.clone());
                token
            }
        };

        self.state = ConnectionState::Connecting;
        let open_timeout = self.config.open_timeout;
        let transport = timeout(open_timeout, self.connector.open())
            .await
            .map_err(|_| Error::timeout("opening transport", millis(open_timeout)))??;
        self.transport = Some(transport);

        self.handshake(&token).await?;
        self.subscribe_all().await?;
        self.announce().await?;

        self.state = ConnectionState::Ready;
        self.last_activity = Instant::now();
        Ok(())
    }

    async fn handshake(&mut self, token: &str) -> Result<()> {
        self.send_frame(&Frame::Connect {
            client_id: token.to_string(),
        })
        .await?;
        self.state = ConnectionState::AwaitingHandshakeAck;

        let ack = self
            .await_frame("handshake acknowledgment", self.config.ack_timeout, |frame| {
                matches!(frame, Frame::ConnectAck { .. })
            })
            .await?;

        match ack {
            Frame::ConnectAck { accepted: true, .. } => {
                debug!("Handshake accepted");
                Ok(())
            }
            Frame::ConnectAck { return_code, .. } => {
                self.token = None;
                Err(Error::handshake_rejected(return_code))
            }
            other => Err(Error::connection(format!(
                "unexpected {:?} frame during handshake",
                other.kind()
            ))),
        }
    }

    async fn subscribe_all(&mut self) -> Result<()> {
        self.state = ConnectionState::Subscribing;

        for (packet_id, topic) in self.config.topics() {
            self.send_frame(&Frame::Subscribe {
                packet_id,
                topic: topic.clone(),
            })
            .await?;
            self.await_frame("subscribe acknowledgment", self.config.ack_timeout, |frame| {
                matches!(frame, Frame::SubscribeAck { packet_id: acked } if *acked == packet_id)
            })
            .await?;
            debug!(%packet_id, %topic, "Subscribed");
        }
        Ok(())
    }

    async fn announce(&mut self) -> Result<()> {
        let join = Frame::Publish {
            topic: self.config.join_topic.clone(),
            payload: self.config.join_payload.clone().into_bytes(),
        };
        self.send_frame(&join).await?;
        debug!(topic = %self.config.join_topic, "Join announced");
        Ok(())
    }
}

// ============================================================================
// Lifecycle - Internals
// ============================================================================

impl<C: Connector, S: TokenSource> Lifecycle<C, S> {
    fn transport_mut(&mut self) -> Result<&mut C::Transport> {
        self.transport.as_mut().ok_or(Error::ConnectionClosed)
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        self.transport_mut()?.send_binary(bytes).await
    }

    /// Reads until a frame matching `wanted` arrives or `limit` elapses.
    ///
    /// Non-matching frames are queued for `receive_next`; peer `PINGREQ` is
    /// answered and not queued.
    async fn await_frame(
        &mut self,
        operation: &str,
        limit: Duration,
        wanted: impl Fn(&Frame) -> bool,
    ) -> Result<Frame> {
        let deadline = Instant::now() + limit;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::timeout(operation, millis(limit)));
            }

            let Some(bytes) = self.transport_mut()?.recv_binary(remaining).await? else {
                continue;
            };
            self.last_activity = Instant::now();

            let Some(frame) = decode_frame(&bytes) else {
                trace!(len = bytes.len(), operation, "Undecodable frame discarded");
                continue;
            };

            if wanted(&frame) {
                return Ok(frame);
            }
            if frame == Frame::PingRequest {
                self.send_frame(&Frame::PingResponse).await?;
                continue;
            }
            trace!(kind = ?frame.kind(), operation, "Frame buffered");
            self.pending.push_back(frame);
        }
    }

    async fn discard_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
    }

    async fn check_cancelled(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.shutdown().await;
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    async fn sleep_or_cancel(&mut self, delay: Duration) -> Result<()> {
        let cancelled = tokio::select! {
            () = self.cancel.cancelled() => true,
            () = sleep(delay) => false,
        };
        if cancelled {
            self.shutdown().await;
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Duration in whole milliseconds for log fields and errors.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
