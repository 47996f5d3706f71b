//! Error types for the round tracker.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use round_tracker::{Result, Error};
//!
//! async fn example(session: &mut FeedSession<C, S, K>) -> Result<()> {
//!     let summary = session.run().await?;
//!     println!("{} rounds recorded", summary.rounds_recorded());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Credential | [`Error::Credential`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::HandshakeRejected`], [`Error::ConnectFailed`] |
//! | Liveness | [`Error::Timeout`], [`Error::ProbeUnanswered`] |
//! | Lifecycle | [`Error::ReconnectExhausted`], [`Error::Cancelled`] |
//! | Codec | [`Error::Codec`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::CodecError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when feed configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Credential Errors
    // ========================================================================
    /// Access token could not be acquired.
    ///
    /// Returned when the token endpoint fails or answers without a token.
    #[error("Credential error: {message}")]
    Credential {
        /// Description of the credential failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    ///
    /// Returned when the WebSocket cannot be opened or a send fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Transport closed unexpectedly.
    ///
    /// Returned when the peer closes the stream during operation.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Peer refused the CONNECT handshake.
    #[error("Handshake rejected (return code {return_code})")]
    HandshakeRejected {
        /// Return code carried by the CONNACK frame (0 means accepted).
        return_code: u8,
    },

    /// Initial connect gave up after its attempt cap.
    #[error("Connect failed after {attempts} attempts: {message}")]
    ConnectFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    // ========================================================================
    // Liveness Errors
    // ========================================================================
    /// Operation timeout.
    ///
    /// Returned when an expected frame does not arrive within its deadline.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Keep-alive probe went unanswered.
    #[error("Keep-alive probe unanswered after {timeout_ms}ms")]
    ProbeUnanswered {
        /// Milliseconds waited for the probe acknowledgment.
        timeout_ms: u64,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Reconnect attempt cap reached.
    ///
    /// Terminal: the lifecycle is in `GivingUp` and the run loop stops.
    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// Stop signal observed.
    #[error("Cancelled by stop signal")]
    Cancelled,

    // ========================================================================
    // Codec Errors
    // ========================================================================
    /// Frame could not be encoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a credential error.
    #[inline]
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a handshake rejected error.
    #[inline]
    pub fn handshake_rejected(return_code: u8) -> Self {
        Self::HandshakeRejected { return_code }
    }

    /// Creates a connect failed error.
    #[inline]
    pub fn connect_failed(attempts: u32, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            attempts,
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a probe unanswered error.
    #[inline]
    pub fn probe_unanswered(timeout_ms: u64) -> Self {
        Self::ProbeUnanswered { timeout_ms }
    }

    /// Creates a reconnect exhausted error.
    #[inline]
    pub fn reconnect_exhausted(attempts: u32) -> Self {
        Self::ReconnectExhausted { attempts }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ProbeUnanswered { .. })
    }

    /// Returns `true` if this error means the transport is unusable.
    ///
    /// These errors move a `Ready` lifecycle into `Reconnecting`.
    #[inline]
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::Timeout { .. }
                | Self::ProbeUnanswered { .. }
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }

    /// Returns `true` if this error is terminal for the process.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ReconnectExhausted { .. } | Self::ConnectFailed { .. } | Self::Cancelled
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on a later connection attempt.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_transport_failure()
            || matches!(
                self,
                Self::HandshakeRejected { .. } | Self::Credential { .. } | Self::Http(_)
            )
    }
}

// ============================================================================
// Tests
// ============================================================================
