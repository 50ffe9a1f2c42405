//! Encrypted cookie session storage.
//!
//! The session payload travels with the client, so no server-side store is
//! needed to read it back. Cookies are small (the sealed value is capped,
//! 1024 bytes by default) and can only be emitted before the response
//! headers go out.
//!
//! To cope with the second limit, [`CookieStore::open`] clears the incoming
//! cookie straight away. If `write` later finds the headers already sent it
//! declines, and the blanked cookie guarantees the next request cannot read
//! stale data from it; the multiplexer falls through to the next backend.

use crate::clock::Clock;
use crate::config::{HybridSessionConfig, SessionCookieParams};
use crate::cookie::CookieJar;
use crate::crypto::{SecretKey, SessionCipher};
use crate::envelope::CookieEnvelope;
use crate::error::{SessionError, SessionResult};
use crate::traits::SessionHandler;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cookie-backed session handler for a single request.
///
/// # Examples
///
/// ```
/// use armature_hybrid_session::*;
/// use std::sync::Arc;
///
/// # async fn example() -> SessionResult<()> {
/// let config = HybridSessionConfig::new("site-secret");
/// let jar = Arc::new(MemoryCookieJar::new());
/// let mut store = CookieStore::new(&config, jar.clone(), SystemClock::shared());
///
/// store.open("", "SESSID").await?;
/// assert!(store.write("abc123", b"payload").await?);
/// assert!(jar.outgoing("SESSID_2").is_some());
/// # Ok(())
/// # }
/// ```
pub struct CookieStore {
    jar: Arc<dyn CookieJar>,
    clock: Arc<dyn Clock>,
    envelope: CookieEnvelope,
    params: SessionCookieParams,
    suffix: String,
    lifetime: u64,
    key: Option<SecretKey>,
    cipher: Option<SessionCipher>,
    /// Cookie name, resolved on `open`
    cookie: Option<String>,
    /// Last known good cookie value; consumed by `read`, replaced by `write`
    current_cookie_data: Option<String>,
}

impl CookieStore {
    /// Create a cookie store from configuration.
    ///
    /// The secret key is taken from the configuration; without one the store
    /// misses on every read and declines every write.
    pub fn new(config: &HybridSessionConfig, jar: Arc<dyn CookieJar>, clock: Arc<dyn Clock>) -> Self {
        Self {
            jar,
            clock,
            envelope: CookieEnvelope::new(config.cookie_max_length),
            params: config.cookie.clone(),
            suffix: config.cookie_suffix.clone(),
            lifetime: config.lifetime(),
            key: config.key(),
            cipher: None,
            cookie: None,
            current_cookie_data: None,
        }
    }

    /// Name of the cookie this store manages, once opened.
    pub fn cookie_name(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Whether a cookie can still be emitted for this response.
    pub fn can_write(&self) -> bool {
        !self.jar.headers_sent()
    }

    /// Cipher for `session_id`, re-derived only when the id changes.
    fn cipher_for(&mut self, session_id: &str) -> Option<&SessionCipher> {
        let key = self.key.as_ref()?;

        let stale = self
            .cipher
            .as_ref()
            .is_none_or(|cipher| cipher.salt() != session_id);
        if stale {
            self.cipher = Some(SessionCipher::new(key, session_id));
        }

        self.cipher.as_ref()
    }

    fn clear_cookie(&mut self, cookie: &str) {
        self.current_cookie_data = None;
        self.jar.force_expiry(cookie, &self.params);
    }
}

#[async_trait]
impl SessionHandler for CookieStore {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn set_key(&mut self, key: Option<SecretKey>) {
        self.key = key.filter(|key| !key.is_empty());
        self.cipher = None;
    }

    async fn open(&mut self, _save_path: &str, name: &str) -> SessionResult<bool> {
        let cookie = format!("{}{}", name, self.suffix);

        // Blank the cookie now; write() may run after headers are flushed.
        self.current_cookie_data = self.jar.get(&cookie).filter(|value| !value.is_empty());
        if self.current_cookie_data.is_some() {
            self.jar.set(&cookie, "", Duration::ZERO, &self.params);
        }

        self.cookie = Some(cookie);
        Ok(true)
    }

    async fn close(&mut self) -> SessionResult<bool> {
        self.cookie = None;
        self.current_cookie_data = None;
        Ok(true)
    }

    async fn read(&mut self, session_id: &str) -> SessionResult<Option<Vec<u8>>> {
        // A cookie value is only ever read once, whatever the outcome.
        let Some(value) = self.current_cookie_data.take() else {
            return Ok(None);
        };

        let now = self.clock.now();
        let envelope = self.envelope;
        let Some(cipher) = self.cipher_for(session_id) else {
            return Ok(None);
        };

        match envelope.open(cipher, &value, now) {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => {
                debug!(backend = "cookie", "Session cookie expired");
                Ok(None)
            }
            Err(e) => {
                debug!(backend = "cookie", error = %e, "Discarding unreadable session cookie");
                Ok(None)
            }
        }
    }

    async fn write(&mut self, session_id: &str, data: &[u8]) -> SessionResult<bool> {
        let Some(cookie) = self.cookie.clone() else {
            debug!(backend = "cookie", "Write before open, declining");
            return Ok(false);
        };

        if !self.can_write() {
            debug!(backend = "cookie", error = %SessionError::Unwritable, "Declining write");
            return Ok(false);
        }

        let expiry = self.clock.expires_in(self.lifetime);
        let envelope = self.envelope;
        let Some(cipher) = self.cipher_for(session_id) else {
            debug!(backend = "cookie", "No secret key, cookie storage disabled");
            return Ok(false);
        };

        let sealed = match envelope.seal(cipher, expiry, data) {
            Ok(sealed) => sealed,
            Err(e @ SessionError::CapacityExceeded { .. }) => {
                debug!(backend = "cookie", error = %e, "Declining write");
                self.clear_cookie(&cookie);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        // Keep "expire on browser close" when the host cookie lifetime is zero.
        let cookie_lifetime = self.params.lifetime.min(self.lifetime);
        self.jar.set(
            &cookie,
            &sealed,
            Duration::from_secs(cookie_lifetime),
            &self.params,
        );
        self.current_cookie_data = Some(sealed);

        Ok(true)
    }

    async fn destroy(&mut self, _session_id: &str) -> SessionResult<bool> {
        match self.cookie.clone() {
            Some(cookie) => self.clear_cookie(&cookie),
            None => self.current_cookie_data = None,
        }
        Ok(true)
    }

    async fn gc(&mut self, _max_lifetime: u64) -> SessionResult<Option<u64>> {
        // Nothing is stored server-side.
        Ok(Some(0))
    }
}
