//! Binary message transport.
//!
//! The lifecycle only needs three operations from the wire: send a binary
//! message, wait a bounded time for the next one, and close. [`Transport`]
//! captures exactly that, and [`Connector`] opens fresh transports for
//! every connect or reconnect attempt.
//!
//! [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::config::FeedConfig;
use crate::error::{Error, Result};

// ============================================================================
// Traits
// ============================================================================

/// Bidirectional binary message stream.
#[async_trait]
pub trait Transport: Send {
    /// Sends one binary message.
    ///
    /// # Errors
    ///
    /// Returns a transport failure if the message cannot be written.
    async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<()>;

    /// Waits up to `wait` for the next message.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] when the peer closed the stream,
    /// or another transport failure.
    async fn recv_binary(&mut self, wait: Duration) -> Result<Option<Vec<u8>>>;

    /// Closes the stream. Errors are ignored.
    async fn close(&mut self);
}

/// Opens transports to the feed endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Opens a new transport.
    ///
    /// # Errors
    ///
    /// Returns a transport failure if the endpoint cannot be reached.
    async fn open(&self) -> Result<Self::Transport>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// WebSocket connector carrying the configured upgrade headers.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    headers: Vec<(String, String)>,
}

impl WsConnector {
    /// Creates a connector for `url` with the given upgrade headers.
    #[must_use]
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            headers,
        }
    }

    /// Creates a connector from the feed configuration.
    #[must_use]
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.feed_url.clone(), config.headers.clone())
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn open(&self) -> Result<WsTransport> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let (stream, response) = connect_async(request).await?;
        debug!(url = %self.url, status = %response.status(), "WebSocket connected");

        Ok(WsTransport { stream })
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket stream to the feed.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.stream.send(Message::Binary(bytes.into())).await?;
        Ok(())
    }

    async fn recv_binary(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + wait;

        loop {
            let next = match timeout_at(deadline, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };

            match next {
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return Err(Error::ConnectionClosed);
                }
                Some(Ok(other)) => {
                    trace!(len = other.len(), "Control message absorbed");
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    debug!("WebSocket stream ended");
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(error = %e, "Close handshake failed");
        }
    }
}
