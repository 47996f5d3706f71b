//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing protocol packet ids with round identity
//! at compile time.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PacketId`] | MQTT packet identifier carried by SUBSCRIBE / SUBACK |
//! | [`Fingerprint`] | Stable identity of one logical game round |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// PacketId
// ============================================================================

/// MQTT packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(u16);

impl PacketId {
    /// Creates a packet id from its wire value.
    #[inline]
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Number of hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Stable identity of one logical round.
///
/// Derived from stake amounts and card slots only, so every snapshot of the
/// same round maps to the same value whatever else differs between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes an already canonicalized key.
    #[must_use]
    pub fn digest(canonical: &str) -> Self {
        let hash = Sha256::digest(canonical.as_bytes());
        let mut hex = String::with_capacity(FINGERPRINT_LEN);
        for byte in hash.iter().take(FINGERPRINT_LEN / 2) {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// Returns the hex representation.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_id_round_trip() {
        let id = PacketId::new(3);
        assert_eq!(id.get(), 3);
        assert_eq!(id.to_string(), "3");
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Fingerprint::digest("0:100:5|1:50:0|2:10:0|1:2:3:4:5:6:0:0:0:");
        let b = Fingerprint::digest("0:100:5|1:50:0|2:10:0|1:2:3:4:5:6:0:0:0:");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), FINGERPRINT_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_differs_for_different_keys() {
        let a = Fingerprint::digest("0:100:5|");
        let b = Fingerprint::digest("0:101:5|");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_serializes_as_string() {
        let fp = Fingerprint::digest("key");
        let json = serde_json::to_string(&fp).expect("serialize");
        assert_eq!(json, format!("\"{}\"", fp.as_str()));
    }
}
