//! Session handler trait definition.

use crate::crypto::SecretKey;
use crate::error::SessionResult;
use async_trait::async_trait;

/// The contract the host framework drives once per request.
///
/// The host calls [`open`](SessionHandler::open), then
/// [`read`](SessionHandler::read) to hydrate session state, then
/// [`write`](SessionHandler::write) or [`destroy`](SessionHandler::destroy),
/// then [`close`](SessionHandler::close). [`gc`](SessionHandler::gc) runs
/// whenever the host decides to collect.
///
/// Absence of data is never an error: `read` returns `Ok(None)`, a refused
/// `write` returns `Ok(false)` and a skipped `gc` returns `Ok(None)`. `Err`
/// is reserved for real failures, which the multiplexer absorbs unless
/// [`SessionError::is_fatal`](crate::SessionError::is_fatal) says otherwise.
///
/// # Examples
///
/// ```no_run
/// use armature_hybrid_session::{SessionHandler, SessionResult};
///
/// async fn request(handler: &mut dyn SessionHandler, id: &str) -> SessionResult<()> {
///     handler.open("", "SESSID").await?;
///     let data = handler.read(id).await?.unwrap_or_default();
///     handler.write(id, &data).await?;
///     handler.close().await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Assign the site secret. Backends that don't encrypt ignore it.
    fn set_key(&mut self, _key: Option<SecretKey>) {}

    /// Start a request for the host session named `name`.
    async fn open(&mut self, save_path: &str, name: &str) -> SessionResult<bool>;

    /// Finish the request.
    async fn close(&mut self) -> SessionResult<bool>;

    /// Load the stored payload for `session_id`.
    async fn read(&mut self, session_id: &str) -> SessionResult<Option<Vec<u8>>>;

    /// Persist `data` for `session_id`. `Ok(false)` means this backend
    /// declined and the next one should be tried.
    async fn write(&mut self, session_id: &str, data: &[u8]) -> SessionResult<bool>;

    /// Remove any stored payload for `session_id`.
    async fn destroy(&mut self, session_id: &str) -> SessionResult<bool>;

    /// Remove expired payloads. Returns the number removed, or `None` when
    /// collection was skipped.
    async fn gc(&mut self, max_lifetime: u64) -> SessionResult<Option<u64>>;
}
