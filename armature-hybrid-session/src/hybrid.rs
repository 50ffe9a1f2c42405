//! Ordered fallback over several session handlers.
//!
//! [`HybridSession`] presents one [`SessionHandler`] over an ordered list of
//! backends:
//!
//! - `read` returns the first non-empty payload, in order, and stops there.
//! - `write` stops at the first backend that accepts. Later backends never
//!   see the data, so a session held in a cookie is invisible to the
//!   database.
//! - `open`, `close`, `destroy` and `gc` go to every backend.
//!
//! Backend errors are logged and treated as a miss or a refusal. Only fatal
//! configuration errors propagate.

use crate::clock::Clock;
use crate::config::{BackendKind, HybridSessionConfig};
use crate::cookie::CookieJar;
use crate::cookie_store::CookieStore;
use crate::crypto::SecretKey;
use crate::database_store::DatabaseStore;
use crate::error::{SessionError, SessionResult};
use crate::traits::SessionHandler;
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session handler multiplexing an ordered list of backends.
///
/// Built once per request. The value itself is the "installed" handle the
/// host threads through its session middleware.
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
///
/// let mut session = HybridSession::builder()
///     .key(config.key())
///     .handler(CookieStore::new(&config, jar, SystemClock::shared()))
///     .build();
///
/// session.open("", "SESSID").await?;
/// let data = session.read("abc123").await?;
/// assert!(data.is_none());
/// assert!(session.write("abc123", b"payload").await?);
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct HybridSession {
    handlers: Vec<Box<dyn SessionHandler>>,
    key: Option<SecretKey>,
}

/// Builder for [`HybridSession`].
#[derive(Default)]
pub struct HybridSessionBuilder {
    handlers: Vec<Box<dyn SessionHandler>>,
    key: Option<SecretKey>,
}

impl HybridSessionBuilder {
    /// Set the site secret.
    pub fn key(mut self, key: Option<SecretKey>) -> Self {
        self.key = key;
        self
    }

    /// Append a handler; handlers are consulted in the order added.
    pub fn handler(mut self, handler: impl SessionHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Append already boxed handlers.
    pub fn handlers(mut self, handlers: impl IntoIterator<Item = Box<dyn SessionHandler>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Build the multiplexer and hand the key to every handler.
    pub fn build(self) -> HybridSession {
        let mut session = HybridSession {
            handlers: self.handlers,
            key: None,
        };

        if self.key.as_ref().is_none_or(SecretKey::is_empty) {
            warn!("Hybrid session was not given a key, cookie storage is disabled");
        }
        session.set_key(self.key);

        session
    }
}

impl HybridSession {
    /// Start building a multiplexer.
    pub fn builder() -> HybridSessionBuilder {
        HybridSessionBuilder::default()
    }

    /// Wire the backends named in `config`, in order.
    ///
    /// `conn` is required when the database backend is configured. Fails with
    /// [`SessionError::UnsupportedEngine`] when it is not a supported engine.
    pub fn from_config(
        config: &HybridSessionConfig,
        jar: Arc<dyn CookieJar>,
        conn: Option<DatabaseConnection>,
        clock: Arc<dyn Clock>,
    ) -> SessionResult<Self> {
        let mut builder = Self::builder().key(config.key());

        for kind in &config.backends {
            builder = match kind {
                BackendKind::Cookie => builder.handler(CookieStore::new(config, jar.clone(), clock.clone())),
                BackendKind::Database => {
                    let conn = conn.clone().ok_or_else(|| {
                        SessionError::Config("database backend configured without a connection".into())
                    })?;
                    builder.handler(DatabaseStore::new(conn, config, clock.clone())?)
                }
            };
        }

        Ok(builder.build())
    }

    /// Handlers in fallback order.
    pub fn handlers(&self) -> &[Box<dyn SessionHandler>] {
        &self.handlers
    }

    /// Replace the handler list. Not meant to run mid-request.
    pub fn set_handlers(&mut self, handlers: Vec<Box<dyn SessionHandler>>) {
        self.handlers = handlers;
        let key = self.key.clone();
        self.set_key(key);
    }

    /// Whether a usable secret key is set.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }
}

/// Log and swallow non-fatal backend errors.
fn absorb<T>(backend: &str, operation: &str, result: SessionResult<T>) -> SessionResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(backend, operation, error = %e, "Session backend failed");
            Ok(None)
        }
    }
}

#[async_trait]
impl SessionHandler for HybridSession {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn set_key(&mut self, key: Option<SecretKey>) {
        self.key = key.filter(|key| !key.is_empty());
        for handler in &mut self.handlers {
            handler.set_key(self.key.clone());
        }
    }

    async fn open(&mut self, save_path: &str, name: &str) -> SessionResult<bool> {
        let mut fatal = None;
        for handler in &mut self.handlers {
            if let Err(e) = absorb(handler.name(), "open", handler.open(save_path, name).await) {
                fatal.get_or_insert(e);
            }
        }
        fatal.map_or(Ok(true), Err)
    }

    async fn close(&mut self) -> SessionResult<bool> {
        let mut fatal = None;
        for handler in &mut self.handlers {
            if let Err(e) = absorb(handler.name(), "close", handler.close().await) {
                fatal.get_or_insert(e);
            }
        }
        fatal.map_or(Ok(true), Err)
    }

    async fn read(&mut self, session_id: &str) -> SessionResult<Option<Vec<u8>>> {
        for handler in &mut self.handlers {
            let data = absorb(handler.name(), "read", handler.read(session_id).await)?.flatten();
            if let Some(data) = data.filter(|data| !data.is_empty()) {
                debug!(backend = handler.name(), "Session read");
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    async fn write(&mut self, session_id: &str, data: &[u8]) -> SessionResult<bool> {
        for handler in &mut self.handlers {
            let accepted = absorb(handler.name(), "write", handler.write(session_id, data).await)?;
            if accepted == Some(true) {
                debug!(backend = handler.name(), "Session written");
                return Ok(true);
            }
        }

        debug!("No session backend accepted the write");
        Ok(false)
    }

    async fn destroy(&mut self, session_id: &str) -> SessionResult<bool> {
        let mut fatal = None;
        for handler in &mut self.handlers {
            if let Err(e) = absorb(handler.name(), "destroy", handler.destroy(session_id).await) {
                fatal.get_or_insert(e);
            }
        }
        fatal.map_or(Ok(true), Err)
    }

    async fn gc(&mut self, max_lifetime: u64) -> SessionResult<Option<u64>> {
        let mut invoked = 0;
        let mut fatal = None;
        for handler in &mut self.handlers {
            if let Err(e) = absorb(handler.name(), "gc", handler.gc(max_lifetime).await) {
                fatal.get_or_insert(e);
            }
            invoked += 1;
        }
        fatal.map_or(Ok(Some(invoked)), Err)
    }
}
