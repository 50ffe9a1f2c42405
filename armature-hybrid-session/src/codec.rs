//! Binary-safe text encoding for database payloads.
//!
//! Payloads are stored in a text column as a two-element JSON array:
//!
//! ```text
//! ["armature-hybrid-session/base64", "<base64 bytes>"]
//! ```
//!
//! The tag keeps random legacy text from being mistaken for an encoded
//! payload: anything that does not decode as this exact shape is handed back
//! unchanged by [`decode_or_raw`].

use base64::{Engine, engine::general_purpose::STANDARD};

/// Identifier written as the first array element.
pub const CODEC_ID: &str = "armature-hybrid-session/base64";

/// Encode arbitrary bytes into a text-column-safe string.
pub fn encode(data: &[u8]) -> String {
    // A (&str, String) tuple always serializes.
    serde_json::to_string(&(CODEC_ID, STANDARD.encode(data))).unwrap_or_default()
}

/// Decode a value produced by [`encode`], or `None` if `text` is not one.
pub fn decode(text: &str) -> Option<Vec<u8>> {
    let (id, body): (String, String) = serde_json::from_str(text).ok()?;
    if id != CODEC_ID {
        return None;
    }
    STANDARD.decode(body).ok()
}

/// Decode `text`, treating anything that isn't an encoded payload as the
/// literal stored bytes.
pub fn decode_or_raw(text: &str) -> Vec<u8> {
    decode(text).unwrap_or_else(|| text.as_bytes().to_vec())
}
