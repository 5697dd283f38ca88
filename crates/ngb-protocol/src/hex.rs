//! Hexadecimal text form of keys and addresses.
//!
//! Encoding is always uppercase; decoding accepts either case.

use data_encoding::{HEXUPPER, HEXUPPER_PERMISSIVE};

/// Errors produced while decoding hex text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex encoding: {reason}")]
    InvalidEncoding { reason: String },

    #[error("invalid length: expected {expected} bytes, got {actual} hex digits")]
    InvalidLength { expected: usize, actual: usize },
}

/// Encode bytes as uppercase hex, two digits per byte, high nibble first.
pub fn encode_hex(bytes: &[u8]) -> String {
    HEXUPPER.encode(bytes)
}

/// Decode hex text (either case) into bytes.
///
/// Fails on odd length or any byte outside `0-9`, `A-F`, `a-f`.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, HexError> {
    HEXUPPER_PERMISSIVE
        .decode(text.as_bytes())
        .map_err(|e| HexError::InvalidEncoding {
            reason: e.to_string(),
        })
}

/// Decode hex text into exactly `N` bytes.
pub fn decode_hex_exact<const N: usize>(text: &str) -> Result<[u8; N], HexError> {
    if text.len() != 2 * N {
        return Err(HexError::InvalidLength {
            expected: N,
            actual: text.len(),
        });
    }
    let bytes = decode_hex(text)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
