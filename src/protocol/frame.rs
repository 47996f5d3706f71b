//! MQTT 3.1.1 control and publish frames.
//!
//! Pure encode/decode functions for the subset of packet types the feed
//! uses. Nothing here performs I/O or keeps state.
//!
//! # Wire Layout
//!
//! ```text
//! ┌────────────┬──────────────────────┬─────────────────────────────┐
//! │ type|flags │ remaining length     │ variable header + payload   │
//! │ 1 byte     │ 1-4 bytes (base 128) │ remaining length bytes      │
//! └────────────┴──────────────────────┴─────────────────────────────┘
//! ```
//!
//! Strings are prefixed with a big-endian `u16` length.

// ============================================================================
// Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::PacketId;

use super::varint::{decode_var_int, encode_var_int};

// ============================================================================
// Constants
// ============================================================================

/// Protocol name in the CONNECT variable header.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// CONNECT flags: username present, password present, clean session.
pub const CONNECT_FLAGS: u8 = 0xC2;

/// Keep-alive interval announced in CONNECT, in seconds.
pub const KEEP_ALIVE_SECS: u16 = 5000;

/// Placeholder username sent with every CONNECT.
pub const PLACEHOLDER_USERNAME: &str = "username";

/// Placeholder password sent with every CONNECT.
pub const PLACEHOLDER_PASSWORD: &str = "password";

/// Shortest buffer that can hold a fixed header.
pub const MIN_FRAME_LEN: usize = 2;

/// PINGREQ frame bytes.
pub const PING_REQUEST: [u8; 2] = [0xC0, 0x00];

/// PINGRESP frame bytes.
pub const PING_RESPONSE: [u8; 2] = [0xD0, 0x00];

/// CONNACK fixed header; the flag bits must be zero.
const CONNECT_ACK_HEADER: u8 = 0x20;

/// SUBSCRIBE fixed header; the reserved flag bits must be `0010`.
const SUBSCRIBE_HEADER: u8 = 0x82;

/// Requested quality of service for every subscription.
const SUBSCRIBE_QOS: u8 = 0;

// ============================================================================
// CodecError
// ============================================================================

/// Error returned when a frame cannot be encoded.
///
/// Decoding never fails loudly: malformed input decodes to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A length-prefixed string exceeds `u16::MAX` bytes.
    #[error("string of {len} bytes does not fit a u16 length prefix")]
    TopicTooLong {
        /// Byte length of the offending string.
        len: usize,
    },

    /// The remaining length exceeds the four-byte variable integer range.
    #[error("remaining length {len} exceeds the variable integer range")]
    LengthOverflow {
        /// The requested remaining length.
        len: usize,
    },
}

// ============================================================================
// FrameKind
// ============================================================================

/// Packet type carried in the high nibble of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// CONNECT
    Connect = 1,
    /// CONNACK
    ConnectAck = 2,
    /// PUBLISH
    Publish = 3,
    /// SUBSCRIBE
    Subscribe = 8,
    /// SUBACK
    SubscribeAck = 9,
    /// PINGREQ
    PingRequest = 12,
    /// PINGRESP
    PingResponse = 13,
}

impl FrameKind {
    /// Reads the packet type from a fixed-header byte.
    ///
    /// Returns `None` for packet types this crate does not handle.
    #[must_use]
    pub fn from_header(byte: u8) -> Option<Self> {
        match byte >> 4 {
            1 => Some(Self::Connect),
            2 => Some(Self::ConnectAck),
            3 => Some(Self::Publish),
            8 => Some(Self::Subscribe),
            9 => Some(Self::SubscribeAck),
            12 => Some(Self::PingRequest),
            13 => Some(Self::PingResponse),
            _ => None,
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Client handshake.
    Connect {
        /// Client identifier (the access token for this feed).
        client_id: String,
    },
    /// Handshake acknowledgment.
    ConnectAck {
        /// `true` when the return code is 0.
        accepted: bool,
        /// Raw return code.
        return_code: u8,
    },
    /// Subscription request.
    Subscribe {
        /// Packet identifier echoed by the SUBACK.
        packet_id: PacketId,
        /// Topic filter.
        topic: String,
    },
    /// Subscription acknowledgment.
    SubscribeAck {
        /// Packet identifier of the acknowledged SUBSCRIBE.
        packet_id: PacketId,
    },
    /// Application message.
    Publish {
        /// Topic the message was published on.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// Keep-alive probe.
    PingRequest,
    /// Keep-alive acknowledgment.
    PingResponse,
}

impl Frame {
    /// Returns the packet type of this frame.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Connect { .. } => FrameKind::Connect,
            Self::ConnectAck { .. } => FrameKind::ConnectAck,
            Self::Subscribe { .. } => FrameKind::Subscribe,
            Self::SubscribeAck { .. } => FrameKind::SubscribeAck,
            Self::Publish { .. } => FrameKind::Publish,
            Self::PingRequest => FrameKind::PingRequest,
            Self::PingResponse => FrameKind::PingResponse,
        }
    }

    /// Encodes this frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a string or the body is too long.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Connect { client_id } => encode_connect(client_id),
            Self::ConnectAck { return_code, .. } => Ok(encode_connect_ack(*return_code)),
            Self::Subscribe { packet_id, topic } => encode_subscribe(*packet_id, topic),
            Self::SubscribeAck { packet_id } => Ok(encode_subscribe_ack(*packet_id)),
            Self::Publish { topic, payload } => encode_publish(topic, payload),
            Self::PingRequest => Ok(PING_REQUEST.to_vec()),
            Self::PingResponse => Ok(PING_RESPONSE.to_vec()),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Builds a CONNECT frame for `client_id`.
///
/// # Errors
///
/// Returns [`CodecError::TopicTooLong`] if `client_id` exceeds `u16::MAX` bytes.
pub fn encode_connect(client_id: &str) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::with_capacity(10 + 2 + client_id.len() + 20);
    put_str(&mut body, PROTOCOL_NAME)?;
    body.push(PROTOCOL_LEVEL);
    body.push(CONNECT_FLAGS);
    body.extend_from_slice(&KEEP_ALIVE_SECS.to_be_bytes());
    put_str(&mut body, client_id)?;
    put_str(&mut body, PLACEHOLDER_USERNAME)?;
    put_str(&mut body, PLACEHOLDER_PASSWORD)?;
    wrap(header(FrameKind::Connect), &body)
}

/// Builds a CONNACK frame. Used by scripted peers in tests and tools.
#[must_use]
pub fn encode_connect_ack(return_code: u8) -> Vec<u8> {
    vec![CONNECT_ACK_HEADER, 0x02, 0x00, return_code]
}

/// Builds a SUBSCRIBE frame for a single topic at QoS 0.
///
/// # Errors
///
/// Returns [`CodecError::TopicTooLong`] if `topic` exceeds `u16::MAX` bytes.
pub fn encode_subscribe(packet_id: PacketId, topic: &str) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::with_capacity(2 + 2 + topic.len() + 1);
    body.extend_from_slice(&packet_id.get().to_be_bytes());
    put_str(&mut body, topic)?;
    body.push(SUBSCRIBE_QOS);
    wrap(SUBSCRIBE_HEADER, &body)
}

/// Builds a SUBACK frame granting QoS 0.
#[must_use]
pub fn encode_subscribe_ack(packet_id: PacketId) -> Vec<u8> {
    let id = packet_id.get().to_be_bytes();
    vec![header(FrameKind::SubscribeAck), 0x03, id[0], id[1], SUBSCRIBE_QOS]
}

/// Builds a QoS 0 PUBLISH frame. The payload is copied verbatim.
///
/// # Errors
///
/// Returns [`CodecError`] if the topic or the whole body is too long.
pub fn encode_publish(topic: &str, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
    put_str(&mut body, topic)?;
    body.extend_from_slice(payload);
    wrap(header(FrameKind::Publish), &body)
}

fn header(kind: FrameKind) -> u8 {
    (kind as u8) << 4
}

fn put_str(out: &mut Vec<u8>, value: &str) -> Result<(), CodecError> {
    let len = u16::try_from(value.len()).map_err(|_| CodecError::TopicTooLong { len: value.len() })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn wrap(first_byte: u8, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(1 + 4 + body.len());
    out.push(first_byte);
    encode_var_int(body.len(), &mut out)?;
    out.extend_from_slice(body);
    Ok(out)
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one frame from a transport message.
///
/// Returns `None` for short or malformed buffers and for packet types
/// outside the supported subset. Never panics on arbitrary input.
#[must_use]
pub fn decode_frame(bytes: &[u8]) -> Option<Frame> {
    if bytes.len() < MIN_FRAME_LEN {
        return None;
    }

    let first = bytes[0];
    let kind = FrameKind::from_header(first)?;
    let (remaining, consumed) = decode_var_int(&bytes[1..])?;
    let body = &bytes[1 + consumed..];

    match kind {
        FrameKind::Connect => decode_connect(body),
        FrameKind::ConnectAck => {
            if first != CONNECT_ACK_HEADER || remaining != 2 {
                return None;
            }
            let return_code = *body.get(1)?;
            Some(Frame::ConnectAck {
                accepted: return_code == 0,
                return_code,
            })
        }
        FrameKind::Publish => decode_publish(first, body),
        FrameKind::Subscribe => {
            let packet_id = read_u16(body, 0)?;
            let (topic, _) = read_str(body, 2)?;
            Some(Frame::Subscribe {
                packet_id: PacketId::new(packet_id),
                topic,
            })
        }
        FrameKind::SubscribeAck => Some(Frame::SubscribeAck {
            packet_id: PacketId::new(read_u16(body, 0)?),
        }),
        FrameKind::PingRequest => Some(Frame::PingRequest),
        FrameKind::PingResponse => Some(Frame::PingResponse),
    }
}

fn decode_connect(body: &[u8]) -> Option<Frame> {
    let (name, pos) = read_str(body, 0)?;
    if name != PROTOCOL_NAME {
        return None;
    }
    // level (1) + flags (1) + keep-alive (2)
    let (client_id, _) = read_str(body, pos + 4)?;
    Some(Frame::Connect { client_id })
}

fn decode_publish(first: u8, body: &[u8]) -> Option<Frame> {
    let qos = (first >> 1) & 0x03;
    let (topic, mut pos) = read_str(body, 0)?;
    if qos > 0 {
        // packet identifier
        read_u16(body, pos)?;
        pos += 2;
    }
    Some(Frame::Publish {
        topic,
        payload: body[pos..].to_vec(),
    })
}

fn read_u16(bytes: &[u8], pos: usize) -> Option<u16> {
    let pair = bytes.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([pair[0], pair[1]]))
}

/// Reads a length-prefixed string, replacing invalid UTF-8.
fn read_str(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    let len = usize::from(read_u16(bytes, pos)?);
    let start = pos + 2;
    let raw = bytes.get(start..start + len)?;
    Some((String::from_utf8_lossy(raw).into_owned(), start + len))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_connect_layout_matches_protocol() {
        let bytes = encode_connect("tok").expect("encode");

        let mut expected = vec![0x10, 35];
        expected.extend_from_slice(b"\x00\x04MQTT\x04\xC2\x13\x88");
        expected.extend_from_slice(b"\x00\x03tok");
        expected.extend_from_slice(b"\x00\x08username");
        expected.extend_from_slice(b"\x00\x08password");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_connect_with_long_client_id_uses_two_byte_length() {
        let client_id = "x".repeat(200);
        let bytes = encode_connect(&client_id).expect("encode");
        // 10 (variable header) + 202 + 10 + 10 = 232
        assert_eq!(&bytes[..3], &[0x10, 0xE8, 0x01]);
        assert_eq!(bytes.len(), 3 + 232);
        assert_eq!(decode_frame(&bytes), Some(Frame::Connect { client_id }));
    }

    #[test]
    fn test_subscribe_layout() {
        let bytes = encode_subscribe(PacketId::new(1), "goldenflower/broadcast").expect("encode");

        let mut expected = vec![0x82, 27, 0x00, 0x01, 0x00, 22];
        expected.extend_from_slice(b"goldenflower/broadcast");
        expected.push(0x00);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_subscribe_decodes_back() {
        let bytes = encode_subscribe(PacketId::new(7), "global/42").expect("encode");
        assert_eq!(
            decode_frame(&bytes),
            Some(Frame::Subscribe {
                packet_id: PacketId::new(7),
                topic: "global/42".to_string(),
            })
        );
    }

    #[test]
    fn test_publish_layout_has_no_terminator() {
        let bytes = encode_publish("t/x", b"{}").expect("encode");
        assert_eq!(bytes, vec![0x30, 7, 0x00, 0x03, b't', b'/', b'x', b'{', b'}']);
    }

    #[test]
    fn test_connect_ack_accepted() {
        assert_eq!(
            decode_frame(&[0x20, 0x02, 0x00, 0x00]),
            Some(Frame::ConnectAck {
                accepted: true,
                return_code: 0
            })
        );
    }

    #[test]
    fn test_connect_ack_rejected() {
        assert_eq!(
            decode_frame(&encode_connect_ack(5)),
            Some(Frame::ConnectAck {
                accepted: false,
                return_code: 5
            })
        );
    }

    #[test]
    fn test_connect_ack_requires_exact_header() {
        assert_eq!(decode_frame(&[0x21, 0x02, 0x00, 0x00]), None);
        assert_eq!(decode_frame(&[0x2F, 0x02, 0x00, 0x00]), None);
        assert_eq!(
            decode_frame(&[0x20, 0x02, 0x01, 0x00]),
            Some(Frame::ConnectAck {
                accepted: true,
                return_code: 0
            })
        );
    }

    #[test]
    fn test_connect_ack_short_is_none() {
        assert_eq!(decode_frame(&[0x20, 0x02, 0x00]), None);
        assert_eq!(decode_frame(&[0x20, 0x03, 0x00, 0x00, 0x00]), None);
    }

    #[test]
    fn test_subscribe_ack() {
        assert_eq!(
            decode_frame(&encode_subscribe_ack(PacketId::new(3))),
            Some(Frame::SubscribeAck {
                packet_id: PacketId::new(3)
            })
        );
    }

    #[test]
    fn test_ping_frames() {
        assert_eq!(decode_frame(&PING_REQUEST), Some(Frame::PingRequest));
        assert_eq!(decode_frame(&PING_RESPONSE), Some(Frame::PingResponse));
        assert_eq!(Frame::PingRequest.encode().expect("encode"), PING_REQUEST);
    }

    #[test]
    fn test_short_buffers_are_none() {
        assert_eq!(decode_frame(&[]), None);
        assert_eq!(decode_frame(&[0x30]), None);
    }

    #[test]
    fn test_unknown_type_is_none() {
        // UNSUBSCRIBE and DISCONNECT are outside the supported subset.
        assert_eq!(decode_frame(&[0xA2, 0x00]), None);
        assert_eq!(decode_frame(&[0xE0, 0x00]), None);
        assert_eq!(decode_frame(&[0x00, 0x00]), None);
    }

    #[test]
    fn test_publish_with_truncated_topic_is_none() {
        assert_eq!(decode_frame(&[0x30, 0x05, 0x00, 0x09, b'a']), None);
        assert_eq!(decode_frame(&[0x30, 0x01, 0x00]), None);
    }

    #[test]
    fn test_publish_with_unterminated_length_is_none() {
        assert_eq!(decode_frame(&[0x30, 0x80, 0x80]), None);
    }

    #[test]
    fn test_publish_invalid_utf8_topic_is_replaced() {
        let frame = decode_frame(&[0x30, 0x05, 0x00, 0x02, 0xFF, b'a', b'!']).expect("frame");
        match frame {
            Frame::Publish { topic, payload } => {
                assert_eq!(topic, "\u{FFFD}a");
                assert_eq!(payload, b"!");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_publish_qos1_skips_packet_id() {
        let bytes = [0x32, 0x07, 0x00, 0x01, b't', 0x00, 0x0A, b'h', b'i'];
        assert_eq!(
            decode_frame(&bytes),
            Some(Frame::Publish {
                topic: "t".to_string(),
                payload: b"hi".to_vec(),
            })
        );
    }

    #[test]
    fn test_frame_kind_round_trip() {
        let frame = Frame::SubscribeAck {
            packet_id: PacketId::new(2),
        };
        let bytes = frame.encode().expect("encode");
        assert_eq!(FrameKind::from_header(bytes[0]), Some(frame.kind()));
    }

    #[test]
    fn test_topic_too_long() {
        let topic = "a".repeat(usize::from(u16::MAX) + 1);
        let err = encode_publish(&topic, b"").expect_err("too long");
        assert!(matches!(err, CodecError::TopicTooLong { .. }));
    }

    #[test]
    fn test_publish_multibyte_topic_at_length_limit() {
        let topic = format!("{}a", "é".repeat(32_767));
        assert_eq!(topic.len(), usize::from(u16::MAX));

        let bytes = encode_publish(&topic, "päyload".as_bytes()).expect("encode");
        assert_eq!(
            decode_frame(&bytes),
            Some(Frame::Publish {
                topic,
                payload: "päyload".as_bytes().to_vec(),
            })
        );
    }

    proptest! {
        #[test]
        fn prop_publish_round_trip(
            topic in any::<String>().prop_filter("topic length fits in u16", |topic| {
                topic.len() <= usize::from(u16::MAX)
            }),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let bytes = encode_publish(&topic, &payload).expect("encode");
            let decoded = decode_frame(&bytes);
            prop_assert_eq!(decoded, Some(Frame::Publish { topic, payload }));
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_frame(&bytes);
        }
    }
}
