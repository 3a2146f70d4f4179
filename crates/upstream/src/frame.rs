//! Decodes one accumulated SSE `data:` chunk into raw protobuf bytes.
//!
//! Precedence: pure hex, then URL-safe base64 (padding restored), then
//! standard base64 (padding restored). Returns `None` on decode failure —
//! upstream may emit heartbeat-like frames that are not meant to decode.

use base64::Engine;

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn restore_padding(s: &str) -> String {
    let remainder = s.len() % 4;
    if remainder == 0 {
        s.to_string()
    } else {
        format!("{s}{}", "=".repeat(4 - remainder))
    }
}

pub fn decode_payload(raw: &str) -> Option<Vec<u8>> {
    let stripped = strip_whitespace(raw);
    if stripped.is_empty() {
        return None;
    }

    if stripped.bytes().all(|b| b.is_ascii_hexdigit()) {
        if let Ok(bytes) = hex::decode(&stripped) {
            return Some(bytes);
        }
    }

    let padded = restore_padding(&stripped);
    if let Ok(bytes) = base64::engine::general_purpose::URL_SAFE.decode(&padded) {
        return Some(bytes);
    }
    base64::engine::general_purpose::STANDARD.decode(&padded).ok()
}

/// Encodes bytes as hex, for constructing test fixtures and for any
/// future symmetrical vendor-mocking needs.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Encodes bytes as unpadded URL-safe base64, matching what upstream is
/// observed to send.
pub fn encode_url_safe_no_pad(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pure_hex() {
        let bytes = b"hello protobuf";
        let encoded = encode_hex(bytes);
        assert_eq!(decode_payload(&encoded).unwrap(), bytes);
    }

    #[test]
    fn decodes_url_safe_base64_without_padding() {
        let bytes = b"\xfa\xfb\xfc\xfd arbitrary bytes that need padding";
        let encoded = encode_url_safe_no_pad(bytes);
        assert_eq!(decode_payload(&encoded).unwrap(), bytes);
    }

    #[test]
    fn decodes_standard_base64() {
        let bytes = b"some bytes with a + and / look-alike in base64 land";
        let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(bytes);
        assert_eq!(decode_payload(&encoded).unwrap(), bytes);
    }

    #[test]
    fn returns_none_on_garbage() {
        assert!(decode_payload("not@@valid$$at!!all").is_none());
    }

    #[test]
    fn returns_none_on_empty() {
        assert!(decode_payload("   ").is_none());
    }

    #[test]
    fn hex_precedence_wins_over_base64_when_ambiguous() {
        // "deadbeef" is valid hex and would also decode as (nonsensical)
        // base64; hex must win per the documented precedence.
        let as_hex = decode_payload("deadbeef").unwrap();
        assert_eq!(as_hex, hex::decode("deadbeef").unwrap());
    }
}
