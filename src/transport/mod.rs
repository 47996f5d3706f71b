//! Feed transport layer.
//!
//! This module owns everything between the network and decoded frames:
//! token acquisition, the WebSocket stream, and the connection lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌──────────────────┐
//! │  Lifecycle       │         WebSocket            │  Feed broker     │
//! │                  │◄────────────────────────────►│                  │
//! │  TokenSource     │   MQTT frames (binary msgs)  │  wss://.../mqtt  │
//! │  Connector       │                              │                  │
//! └──────────────────┘                              └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `TokenSource::acquire_token` - Fetch (or reuse) the access token
//! 2. `Connector::open` - Open the WebSocket with the upgrade headers
//! 3. CONNECT / CONNACK - Handshake with the token as client id
//! 4. SUBSCRIBE / SUBACK - Broadcast topic plus two identity topics
//! 5. PUBLISH join announcement, then `Ready`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect delay schedule |
//! | `credential` | Access token sources |
//! | `lifecycle` | Connection state machine |
//! | `socket` | Transport traits and WebSocket implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect delay schedule.
pub mod backoff;

/// Access token sources.
pub mod credential;

/// Connection state machine.
pub mod lifecycle;

/// Transport traits and WebSocket implementation.
pub mod socket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::ReconnectPolicy;
pub use credential::{HttpTokenSource, StaticToken, TokenSource};
pub use lifecycle::{ConnectionState, Lifecycle};
pub use socket::{Connector, Transport, WsConnector, WsTransport};
