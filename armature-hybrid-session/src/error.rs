//! Error types for hybrid session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
///
/// Only [`SessionError::UnsupportedEngine`] is fatal. Every other variant is
/// local to one backend call: the multiplexer logs it and moves on to the
/// next backend.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Envelope tag did not verify under the derived key
    #[error("Session envelope failed authentication")]
    AuthenticationFailure,

    /// Sealed cookie value is larger than the configured maximum
    #[error("Session payload too large for cookie storage: {size} > {max} bytes")]
    CapacityExceeded {
        /// Size of the sealed value
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Response headers are already sent, a cookie can no longer be emitted
    #[error("Session cookie cannot be written after headers are sent")]
    Unwritable,

    /// Backing store preconditions are not met (no table, no connection)
    #[error("Session backend not ready: {0}")]
    BackendNotReady(String),

    /// The database engine is not one the database store can drive
    #[error("Unsupported session database engine: {0}")]
    UnsupportedEngine(String),

    /// Database error from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Envelope could not be decoded (bad base64, truncated, bad prefix)
    #[error("Invalid session envelope: {0}")]
    InvalidEnvelope(String),

    /// Encryption or encoding failure
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether this error must abort configuration instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::UnsupportedEngine(_))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Encoding(err.to_string())
    }
}

impl From<base64::DecodeError> for SessionError {
    fn from(err: base64::DecodeError) -> Self {
        SessionError::InvalidEnvelope(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unsupported_engine_is_fatal() {
        assert!(SessionError::UnsupportedEngine("Postgres".into()).is_fatal());
        assert!(!SessionError::AuthenticationFailure.is_fatal());
        assert!(!SessionError::Unwritable.is_fatal());
        assert!(!SessionError::BackendNotReady("no table".into()).is_fatal());
        assert!(!SessionError::CapacityExceeded { size: 2048, max: 1024 }.is_fatal());
    }

    #[test]
    fn test_capacity_display() {
        let err = SessionError::CapacityExceeded { size: 2048, max: 1024 };
        assert!(err.to_string().contains("2048 > 1024"));
    }
}
