//! Hybrid cookie and database session storage for Armature framework.
//!
//! Small sessions live client-side in an encrypted, expiring cookie. When a
//! cookie can't be written (headers already sent, payload too large, no
//! secret key) the session falls back to a database table. Reads consult the
//! backends in the same order and take the first hit.
//!
//! # Backends
//!
//! - [`CookieStore`] - AES-256-GCM sealed cookie with a 10-digit expiry prefix
//! - [`DatabaseStore`] - `hybrid_session_data` table over SeaORM (MySQL, SQLite)
//! - [`HybridSession`] - ordered fallback over any set of [`SessionHandler`]s
//!
//! # Features
//!
//! - `runtime-tokio-rustls` - Tokio runtime with rustls (enabled by default)
//! - `runtime-tokio-native-tls` - Tokio runtime with native TLS
//! - `sqlx-mysql` - MySQL driver (enabled by default)
//! - `sqlx-sqlite` - SQLite driver
//!
//! # Examples
//!
//! ```no_run
//! use armature_hybrid_session::*;
//! use sea_orm::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let config = HybridSessionConfig::from_env()?;
//!     let jar = Arc::new(MemoryCookieJar::new());
//!     let conn = Database::connect("mysql://root@localhost/app").await?;
//!
//!     let mut session = HybridSession::from_config(
//!         &config,
//!         jar,
//!         Some(conn),
//!         SystemClock::shared(),
//!     )?;
//!
//!     session.open("", "SESSID").await?;
//!     let data = session.read("abc123").await?.unwrap_or_default();
//!     session.write("abc123", &data).await?;
//!     session.close().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod cookie;
pub mod cookie_store;
pub mod crypto;
pub mod database_store;
pub mod envelope;
pub mod error;
pub mod hybrid;
pub mod traits;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{BackendKind, HybridSessionConfig, SessionCookieParams};
pub use cookie::{CookieJar, MemoryCookieJar, OutgoingCookie};
pub use cookie_store::CookieStore;
pub use crypto::{SecretKey, SessionCipher};
pub use database_store::{DatabaseStore, hash_session_id};
pub use envelope::CookieEnvelope;
pub use error::{SessionError, SessionResult};
pub use hybrid::{HybridSession, HybridSessionBuilder};
pub use traits::SessionHandler;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::{BackendKind, HybridSessionConfig, SessionCookieParams};
    pub use crate::cookie::{CookieJar, MemoryCookieJar};
    pub use crate::cookie_store::CookieStore;
    pub use crate::crypto::SecretKey;
    pub use crate::database_store::DatabaseStore;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::hybrid::HybridSession;
    pub use crate::traits::SessionHandler;
}
