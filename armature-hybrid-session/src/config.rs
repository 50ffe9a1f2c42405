//! Hybrid session configuration.

use crate::crypto::SecretKey;
use crate::envelope::DEFAULT_MAX_LENGTH;
use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A session storage backend that can appear in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Encrypted client-side cookie
    Cookie,
    /// Server-side database table
    Database,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cookie => write!(f, "cookie"),
            BackendKind::Database => write!(f, "database"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cookie" => Ok(BackendKind::Cookie),
            "database" | "db" => Ok(BackendKind::Database),
            other => Err(SessionError::Config(format!("Unknown session backend: {}", other))),
        }
    }
}

/// Host session cookie parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookieParams {
    /// Cookie lifetime in seconds; zero means "until the browser closes"
    #[serde(default)]
    pub lifetime: u64,
    /// Cookie path
    #[serde(default = "default_path")]
    pub path: String,
    /// Cookie domain
    #[serde(default)]
    pub domain: Option<String>,
    /// Send only over HTTPS
    #[serde(default)]
    pub secure: bool,
    /// Hide from client-side scripts
    #[serde(default = "default_true")]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SessionCookieParams {
    fn default() -> Self {
        Self {
            lifetime: 0,
            path: default_path(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }
}

/// Hybrid session configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct HybridSessionConfig {
    /// Site-wide secret used to derive cookie keys
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Maximum sealed cookie value length in bytes
    #[serde(default = "default_cookie_max_length")]
    pub cookie_max_length: usize,
    /// Suffix appended to the host session cookie name
    #[serde(default = "default_cookie_suffix")]
    pub cookie_suffix: String,
    /// Host session cookie parameters
    #[serde(default)]
    pub cookie: SessionCookieParams,
    /// Garbage collection max lifetime in seconds
    #[serde(default = "default_gc_max_lifetime")]
    pub gc_max_lifetime: u64,
    /// Backends in fallback order
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendKind>,
}

fn default_cookie_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_cookie_suffix() -> String {
    "_2".to_string()
}

fn default_gc_max_lifetime() -> u64 {
    1440 // 24 minutes
}

fn default_backends() -> Vec<BackendKind> {
    vec![BackendKind::Cookie, BackendKind::Database]
}

impl Default for HybridSessionConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            cookie_max_length: default_cookie_max_length(),
            cookie_suffix: default_cookie_suffix(),
            cookie: SessionCookieParams::default(),
            gc_max_lifetime: default_gc_max_lifetime(),
            backends: default_backends(),
        }
    }
}

impl fmt::Debug for HybridSessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridSessionConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("cookie_max_length", &self.cookie_max_length)
            .field("cookie_suffix", &self.cookie_suffix)
            .field("cookie", &self.cookie)
            .field("gc_max_lifetime", &self.gc_max_lifetime)
            .field("backends", &self.backends)
            .finish()
    }
}

impl HybridSessionConfig {
    /// Create a configuration with the given secret key.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_hybrid_session::HybridSessionConfig;
    ///
    /// let config = HybridSessionConfig::new("site-secret").with_gc_max_lifetime(3600);
    /// assert_eq!(config.lifetime(), 3600);
    /// ```
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: Some(secret_key.into()),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Uses the following environment variables:
    /// - `HYBRID_SESSION_KEY`: Site secret (cookie storage is disabled without it)
    /// - `HYBRID_SESSION_COOKIE_MAX_LENGTH`: Max sealed cookie length (default: 1024)
    /// - `HYBRID_SESSION_COOKIE_LIFETIME`: Cookie lifetime in seconds (default: 0)
    /// - `HYBRID_SESSION_COOKIE_PATH`: Cookie path (default: /)
    /// - `HYBRID_SESSION_COOKIE_DOMAIN`: Cookie domain
    /// - `HYBRID_SESSION_COOKIE_SECURE`: Secure flag (true/false)
    /// - `HYBRID_SESSION_COOKIE_HTTPONLY`: HttpOnly flag (true/false)
    /// - `HYBRID_SESSION_GC_MAXLIFETIME`: GC max lifetime in seconds (default: 1440)
    /// - `HYBRID_SESSION_BACKENDS`: Comma separated order, e.g. `cookie,database`
    pub fn from_env() -> SessionResult<Self> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("HYBRID_SESSION_KEY") {
            if !key.is_empty() {
                config.secret_key = Some(key);
            }
        }

        if let Ok(max) = std::env::var("HYBRID_SESSION_COOKIE_MAX_LENGTH") {
            config.cookie_max_length = max
                .parse()
                .map_err(|_| SessionError::Config("Invalid HYBRID_SESSION_COOKIE_MAX_LENGTH".into()))?;
        }

        if let Ok(lifetime) = std::env::var("HYBRID_SESSION_COOKIE_LIFETIME") {
            config.cookie.lifetime = lifetime
                .parse()
                .map_err(|_| SessionError::Config("Invalid HYBRID_SESSION_COOKIE_LIFETIME".into()))?;
        }

        if let Ok(path) = std::env::var("HYBRID_SESSION_COOKIE_PATH") {
            config.cookie.path = path;
        }

        if let Ok(domain) = std::env::var("HYBRID_SESSION_COOKIE_DOMAIN") {
            config.cookie.domain = Some(domain).filter(|d| !d.is_empty());
        }

        if let Ok(secure) = std::env::var("HYBRID_SESSION_COOKIE_SECURE") {
            config.cookie.secure = parse_flag(&secure);
        }

        if let Ok(http_only) = std::env::var("HYBRID_SESSION_COOKIE_HTTPONLY") {
            config.cookie.http_only = parse_flag(&http_only);
        }

        if let Ok(gc) = std::env::var("HYBRID_SESSION_GC_MAXLIFETIME") {
            config.gc_max_lifetime = gc
                .parse()
                .map_err(|_| SessionError::Config("Invalid HYBRID_SESSION_GC_MAXLIFETIME".into()))?;
        }

        if let Ok(backends) = std::env::var("HYBRID_SESSION_BACKENDS") {
            config.backends = parse_backends(&backends)?;
        }

        Ok(config)
    }

    /// Set the secret key.
    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    /// Set the maximum sealed cookie length.
    pub fn with_cookie_max_length(mut self, max: usize) -> Self {
        self.cookie_max_length = max;
        self
    }

    /// Set the cookie name suffix.
    pub fn with_cookie_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.cookie_suffix = suffix.into();
        self
    }

    /// Set the host cookie parameters.
    pub fn with_cookie_params(mut self, params: SessionCookieParams) -> Self {
        self.cookie = params;
        self
    }

    /// Set the cookie lifetime in seconds.
    pub fn with_cookie_lifetime(mut self, seconds: u64) -> Self {
        self.cookie.lifetime = seconds;
        self
    }

    /// Set the GC max lifetime in seconds.
    pub fn with_gc_max_lifetime(mut self, seconds: u64) -> Self {
        self.gc_max_lifetime = seconds;
        self
    }

    /// Set the backend order.
    pub fn with_backends(mut self, backends: Vec<BackendKind>) -> Self {
        self.backends = backends;
        self
    }

    /// The configured secret, if any.
    pub fn key(&self) -> Option<SecretKey> {
        self.secret_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(SecretKey::from)
    }

    /// Storage lifetime in seconds.
    ///
    /// The shorter of the cookie lifetime and the GC max lifetime; a
    /// browser-session cookie (lifetime zero) falls back to the GC lifetime.
    pub fn lifetime(&self) -> u64 {
        if self.cookie.lifetime > 0 {
            self.cookie.lifetime.min(self.gc_max_lifetime)
        } else {
            self.gc_max_lifetime
        }
    }

    /// Cookie name used by the cookie store for a host session name.
    pub fn cookie_name(&self, session_name: &str) -> String {
        format!("{}{}", session_name, self.cookie_suffix)
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_backends(value: &str) -> SessionResult<Vec<BackendKind>> {
    value
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(BackendKind::from_str)
        .collect()
}
