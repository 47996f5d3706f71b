//! Binary publish/subscribe protocol.
//!
//! This module implements the MQTT 3.1.1 subset spoken over the feed's
//! WebSocket tunnel. Every function here is pure: no I/O, no state.
//!
//! # Packet Subset
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `CONNECT` | Local → Remote | Handshake carrying the access token |
//! | `CONNACK` | Remote → Local | Handshake verdict |
//! | `SUBSCRIBE` | Local → Remote | Topic subscription |
//! | `SUBACK` | Remote → Local | Subscription verdict |
//! | `PUBLISH` | Both | Application messages |
//! | `PINGREQ` / `PINGRESP` | Both | Keep-alive |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame type, encoders, decoder |
//! | `varint` | Remaining-length integer codec |

// ============================================================================
// Submodules
// ============================================================================

/// Frame type, encoders and decoder.
pub mod frame;

/// Variable-length remaining-length integers.
pub mod varint;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{
    CodecError, Frame, FrameKind, PING_REQUEST, PING_RESPONSE, decode_frame, encode_connect,
    encode_connect_ack, encode_publish, encode_subscribe, encode_subscribe_ack,
};
pub use varint::{MAX_VAR_INT, decode_var_int, encode_var_int};
