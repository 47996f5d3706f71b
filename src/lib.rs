//! Round Tracker - real-time round feed recorder.
//!
//! This library keeps a persistent connection to a publish/subscribe round
//! feed tunneled through a WebSocket, decodes its broadcast frames into
//! typed snapshots, and folds them into deduplicated round records with
//! betting-pattern and house-edge analytics.
//!
//! # Architecture
//!
//! Three components communicate through explicit typed values:
//!
//! - **Frame codec** ([`protocol`]): pure MQTT 3.1.1 subset encode/decode
//! - **Connection lifecycle** ([`transport`]): handshake, keep-alive probes,
//!   bounded linear-backoff reconnection
//! - **Round aggregation** ([`round`]): round counter, settlement dedup,
//!   analytics
//!
//! ```text
//! bytes ──► Frame ──► RoundSnapshot ──► RoundEngine ──► RoundRecord ──► RecordSink
//! ```
//!
//! Key design principles:
//!
//! - One lifecycle owns the transport; no concurrent writers
//! - Snapshots are validated once at the decode boundary
//! - The engine is a pure function of its input and two pieces of state
//!
//! # Quick Start
//!
//! ```no_run
//! use round_tracker::transport::{HttpTokenSource, Lifecycle, WsConnector};
//! use round_tracker::{FeedConfig, FeedSession, JsonFileStore, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FeedConfig::default();
//!     config.validate()?;
//!
//!     let tokens = HttpTokenSource::from_config(&config)?;
//!     let connector = WsConnector::from_config(&config);
//!     let lifecycle = Lifecycle::new(config, connector, tokens, CancellationToken::new());
//!
//!     let mut session = FeedSession::new(lifecycle, JsonFileStore::new("results.json"));
//!     let summary = session.run().await?;
//!     println!("{} rounds recorded", summary.rounds_recorded());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Feed configuration and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Packet ids and round fingerprints |
//! | [`protocol`] | Frame codec |
//! | [`round`] | Snapshots, engine, records, analytics |
//! | [`session`] | Run loop |
//! | [`store`] | Record persistence |
//! | [`transport`] | Credentials, WebSocket, lifecycle |

// ============================================================================
// Modules
// ============================================================================

/// Feed configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Frame codec for the MQTT subset.
///
/// Pure functions; no I/O and no state.
pub mod protocol;

/// Round aggregation: snapshots, engine, records and analytics.
pub mod round;

/// Feed session run loop.
pub mod session;

/// Round record persistence.
pub mod store;

/// Transport layer.
///
/// Token acquisition, WebSocket stream and connection lifecycle.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::FeedConfig;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Fingerprint, PacketId};

// Protocol types
pub use protocol::{CodecError, Frame};

// Round types
pub use round::{
    BetOption, BettingPattern, GameState, HouseEdge, OptionId, RoundEngine, RoundRecord,
    RoundSnapshot, RoundStatistics,
};

// Session types
pub use session::{FeedSession, RunSummary};

// Store types
pub use store::{JsonFileStore, RecordSink};

// Transport types
pub use transport::{ConnectionState, Lifecycle};
