//! Authenticated encryption for cookie envelopes.
//!
//! A per-session key is derived from the site secret and the session id with
//! PBKDF2-HMAC-SHA256, then payloads are sealed with AES-256-GCM:
//!
//! ```text
//! base64( nonce[12] || tag[16] || ciphertext )
//! ```
//!
//! The tag is verified (in constant time, by the AEAD) before any plaintext is
//! produced. A failed check yields [`SessionError::AuthenticationFailure`] and
//! nothing else.

use crate::error::{SessionError, SessionResult};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// PBKDF2 iteration count used for every derived key.
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-GCM tag length.
pub const TAG_LEN: usize = 16;

/// Site-wide secret used as the base for every per-session key.
///
/// The bytes are wiped when the key is dropped and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the secret is empty (an empty secret disables cookie storage).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl From<&str> for SecretKey {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for SecretKey {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

/// Derive the per-session key from the site secret and a salt.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, PBKDF2_ITERATIONS, &mut key[..]);
    key
}

/// Seals and opens envelopes under one derived key.
///
/// The salt the key was derived from is kept so callers can tell whether a
/// cached cipher still belongs to the current session.
pub struct SessionCipher {
    salt: String,
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SessionCipher {
    /// Derive a cipher for `salt` (the session id) under `secret`.
    pub fn new(secret: &SecretKey, salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
            key: derive_key(secret.as_bytes(), salt.as_bytes()),
        }
    }

    /// Salt the key was derived from.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    fn cipher(&self) -> SessionResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key[..]).map_err(|e| SessionError::Encoding(e.to_string()))
    }

    /// Encrypt and authenticate `plaintext`, returning the base64 envelope.
    pub fn seal(&self, plaintext: &[u8]) -> SessionResult<String> {
        let cipher = self.cipher()?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer)
            .map_err(|e| SessionError::Encoding(e.to_string()))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(tag.as_slice());
        envelope.extend_from_slice(&buffer);

        Ok(STANDARD.encode(envelope))
    }

    /// Verify and decrypt an envelope produced by [`SessionCipher::seal`].
    pub fn open(&self, envelope: &str) -> SessionResult<Vec<u8>> {
        let raw = STANDARD.decode(envelope.trim())?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(SessionError::InvalidEnvelope(format!(
                "envelope is {} bytes, need at least {}",
                raw.len(),
                NONCE_LEN + TAG_LEN
            )));
        }

        let (nonce, rest) = raw.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let cipher = self.cipher()?;
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| SessionError::AuthenticationFailure)?;

        Ok(buffer)
    }
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCipher")
            .field("salt", &self.salt)
            .finish_non_exhaustive()
    }
}
