//! Expiring cookie envelopes.
//!
//! The sealed plaintext is a 10-digit, zero-padded Unix expiry followed by
//! the raw session bytes (`%010u` + data). Expiry is checked on every open,
//! and an expired envelope reads exactly like a missing one.

use crate::crypto::SessionCipher;
use crate::error::{SessionError, SessionResult};

/// Width of the expiry prefix.
pub const EXPIRY_DIGITS: usize = 10;

/// Default maximum serialized cookie value length, in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 1024;

/// Builds and unpacks expiring envelopes under a size cap.
#[derive(Debug, Clone, Copy)]
pub struct CookieEnvelope {
    max_length: usize,
}

impl Default for CookieEnvelope {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl CookieEnvelope {
    /// Create an envelope builder that rejects sealed values over `max_length`.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Maximum serialized length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Seal `data` with an absolute `expiry`.
    ///
    /// Fails with [`SessionError::CapacityExceeded`] when the raw data or the
    /// sealed value is longer than the cap.
    pub fn seal(&self, cipher: &SessionCipher, expiry: i64, data: &[u8]) -> SessionResult<String> {
        if data.len() > self.max_length {
            return Err(SessionError::CapacityExceeded {
                size: data.len(),
                max: self.max_length,
            });
        }

        let sealed = cipher.seal(&encode_payload(expiry, data))?;
        if sealed.len() > self.max_length {
            return Err(SessionError::CapacityExceeded {
                size: sealed.len(),
                max: self.max_length,
            });
        }

        Ok(sealed)
    }

    /// Open an envelope, returning the payload if it verifies and has not
    /// expired at `now`.
    pub fn open(&self, cipher: &SessionCipher, value: &str, now: i64) -> SessionResult<Option<Vec<u8>>> {
        let plaintext = cipher.open(value)?;
        let (expiry, data) = decode_payload(&plaintext)?;

        if expiry > now {
            Ok(Some(data.to_vec()))
        } else {
            Ok(None)
        }
    }
}

/// Prefix `data` with the zero-padded expiry.
pub fn encode_payload(expiry: i64, data: &[u8]) -> Vec<u8> {
    let expiry = expiry.clamp(0, 9_999_999_999);
    let mut payload = Vec::with_capacity(EXPIRY_DIGITS + data.len());
    payload.extend_from_slice(format!("{:010}", expiry).as_bytes());
    payload.extend_from_slice(data);
    payload
}

/// Split a decrypted payload into its expiry and data.
pub fn decode_payload(payload: &[u8]) -> SessionResult<(i64, &[u8])> {
    if payload.len() < EXPIRY_DIGITS {
        return Err(SessionError::InvalidEnvelope("missing expiry prefix".into()));
    }

    let (prefix, data) = payload.split_at(EXPIRY_DIGITS);
    if !prefix.iter().all(u8::is_ascii_digit) {
        return Err(SessionError::InvalidEnvelope("non-numeric expiry prefix".into()));
    }

    // Ten ASCII digits always fit in an i64.
    let expiry = prefix
        .iter()
        .fold(0i64, |acc, digit| acc * 10 + i64::from(digit - b'0'));

    Ok((expiry, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    const NOW: i64 = 1_268_654_400;

    fn cipher() -> SessionCipher {
        SessionCipher::new(&SecretKey::from("site-secret"), "abc123")
    }

    #[test]
    fn test_payload_prefix_is_zero_padded() {
        assert_eq!(encode_payload(42, b"data"), b"0000000042data");
        assert_eq!(encode_payload(NOW, b""), b"1268654400");
    }

    #[test]
    fn test_decode_payload() {
        let (expiry, data) = decode_payload(b"1268654400\x00abc").unwrap();
        assert_eq!(expiry, NOW);
        assert_eq!(data, b"\x00abc");

        assert!(decode_payload(b"12345").is_err());
        assert!(decode_payload(b"12345abcde rest").is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let envelope = CookieEnvelope::default();
        let cipher = cipher();
        let sealed = envelope.seal(&cipher, NOW + 1, b"payload").unwrap();

        assert_eq!(
            envelope.open(&cipher, &sealed, NOW).unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(envelope.open(&cipher, &sealed, NOW + 2).unwrap(), None);
    }

    #[test]
    fn test_capacity_is_measured_on_sealed_value() {
        let envelope = CookieEnvelope::new(100);
        let cipher = cipher();

        // 60 raw bytes fit under the cap but their sealed form does not.
        let err = envelope.seal(&cipher, NOW, &[b'x'; 60]).unwrap_err();
        assert!(matches!(err, SessionError::CapacityExceeded { max: 100, .. }));

        assert!(envelope.seal(&cipher, NOW, &[b'x'; 20]).is_ok());
    }

    #[test]
    fn test_tampered_envelope_is_rejected() {
        let envelope = CookieEnvelope::default();
        let sealed = envelope.seal(&cipher(), NOW + 60, b"payload").unwrap();
        let other = SessionCipher::new(&SecretKey::from("site-secret"), "other");

        assert!(matches!(
            envelope.open(&other, &sealed, NOW),
            Err(SessionError::AuthenticationFailure)
        ));
    }
}
