//! Variable-length "remaining length" integers.
//!
//! MQTT encodes the remaining-length field base-128, least significant group
//! first, with the high bit of each byte set while more bytes follow. At most
//! four bytes are allowed, which caps the value at [`MAX_VAR_INT`].

use super::CodecError;

// ============================================================================
// Constants
// ============================================================================

/// Largest value representable in four bytes.
pub const MAX_VAR_INT: usize = 268_435_455;

/// Maximum encoded width in bytes.
pub const MAX_VAR_INT_BYTES: usize = 4;

const CONTINUATION: u8 = 0x80;

// ============================================================================
// Encoding
// ============================================================================

/// Appends `value` to `out` in variable-length form.
///
/// Zero encodes as a single `0x00` byte.
///
/// # Errors
///
/// Returns [`CodecError::LengthOverflow`] if `value` exceeds [`MAX_VAR_INT`].
pub fn encode_var_int(value: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    if value > MAX_VAR_INT {
        return Err(CodecError::LengthOverflow { len: value });
    }

    let mut remaining = value;
    loop {
        // Masked to 7 bits, the cast cannot truncate.
        let mut byte = (remaining % 128) as u8;
        remaining /= 128;
        if remaining > 0 {
            byte |= CONTINUATION;
        }
        out.push(byte);
        if remaining == 0 {
            return Ok(());
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Reads a variable-length integer from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// buffer ends before the terminating byte or the encoding runs past four
/// bytes.
#[must_use]
pub fn decode_var_int(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    let mut multiplier = 1usize;

    for (index, &byte) in bytes.iter().take(MAX_VAR_INT_BYTES).enumerate() {
        value += usize::from(byte & !CONTINUATION) * multiplier;
        if byte & CONTINUATION == 0 {
            return Some((value, index + 1));
        }
        multiplier *= 128;
    }

    None
}

// ============================================================================
// Tests
// ============================================================================
