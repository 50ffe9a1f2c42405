//! Cookie I/O capability supplied by the host.

use crate::config::SessionCookieParams;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Read and write access to the current request's cookies.
///
/// Implemented by the host framework around its request/response pair. All
/// methods take `&self`; implementations stage outgoing cookies internally.
pub trait CookieJar: Send + Sync {
    /// Incoming cookie value, if the request carried one.
    fn get(&self, name: &str) -> Option<String>;

    /// Emit a cookie. A zero `lifetime` makes a browser-session cookie.
    fn set(&self, name: &str, value: &str, lifetime: Duration, params: &SessionCookieParams);

    /// Emit an already-expired cookie so the client drops it.
    fn force_expiry(&self, name: &str, params: &SessionCookieParams);

    /// Whether response headers have already been flushed.
    fn headers_sent(&self) -> bool;
}

/// A cookie staged for the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCookie {
    /// Cookie value
    pub value: String,
    /// Lifetime, zero for a browser-session cookie
    pub lifetime: Duration,
    /// Parameters the cookie was emitted with
    pub params: SessionCookieParams,
    /// Whether the cookie was force-expired
    pub expired: bool,
}

/// In-memory cookie jar.
///
/// Holds the incoming cookies of one request and records what would be sent
/// back. Useful for tests and for hosts that build `Set-Cookie` headers after
/// the session has been written.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    incoming: Mutex<HashMap<String, String>>,
    outgoing: Mutex<HashMap<String, OutgoingCookie>>,
    headers_sent: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryCookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an incoming request cookie.
    pub fn with_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_incoming(name, value);
        self
    }

    /// Add or replace an incoming request cookie.
    pub fn insert_incoming(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.incoming).insert(name.into(), value.into());
    }

    /// Mark response headers as sent (or not).
    pub fn set_headers_sent(&self, sent: bool) {
        self.headers_sent.store(sent, Ordering::SeqCst);
    }

    /// The cookie staged for `name`, if any.
    pub fn outgoing(&self, name: &str) -> Option<OutgoingCookie> {
        lock(&self.outgoing).get(name).cloned()
    }

    /// Start the next request: live outgoing cookies become the incoming set,
    /// expired or blank ones are dropped, and the headers flag is reset.
    pub fn next_request(&self) {
        let outgoing: Vec<(String, OutgoingCookie)> = lock(&self.outgoing).drain().collect();
        let mut incoming = lock(&self.incoming);
        for (name, cookie) in outgoing {
            if cookie.expired || cookie.value.is_empty() {
                incoming.remove(&name);
            } else {
                incoming.insert(name, cookie.value);
            }
        }
        self.headers_sent.store(false, Ordering::SeqCst);
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        lock(&self.incoming).get(name).cloned()
    }

    fn set(&self, name: &str, value: &str, lifetime: Duration, params: &SessionCookieParams) {
        lock(&self.outgoing).insert(
            name.to_string(),
            OutgoingCookie {
                value: value.to_string(),
                lifetime,
                params: params.clone(),
                expired: false,
            },
        );
    }

    fn force_expiry(&self, name: &str, params: &SessionCookieParams) {
        lock(&self.outgoing).insert(
            name.to_string(),
            OutgoingCookie {
                value: String::new(),
                lifetime: Duration::ZERO,
                params: params.clone(),
                expired: true,
            },
        );
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent.load(Ordering::SeqCst)
    }
}
