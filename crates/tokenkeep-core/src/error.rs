//! Error types for the core library.

use thiserror::Error;

/// Failure reported by a key-value storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error from the plain file backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The plain backend file could not be parsed or written as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The OS credential store rejected the operation.
    #[error("credential store error: {0}")]
    Keyring(#[from] keyring::Error),

    /// The backend cannot be reached at all.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Token lifecycle error.
///
/// Callers branch on the variant: [`TokenError::Expired`] and
/// [`TokenError::Invalid`] mean the user must sign in again, while
/// [`TokenError::Storage`] is a transient condition that should not
/// end the session.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The storage backend failed.
    #[error("token storage error: {message}")]
    Storage {
        /// What the manager was doing when the backend failed.
        message: String,
        /// The underlying backend failure, if any.
        #[source]
        source: Option<StorageError>,
    },

    /// The token is past its expiry, or its expiry cannot be read.
    #[error("token expired: {0}")]
    Expired(String),

    /// The token is not a decodable JWT.
    #[error("invalid token: {0}")]
    Invalid(String),
}

impl TokenError {
    /// Wrap a backend failure with a description of the failed operation.
    pub fn storage(message: impl Into<String>, source: StorageError) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns `true` when the error means the stored credential is unusable
    /// and the user has to sign in again.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Expired(_) | Self::Invalid(_))
    }
}

/// Result type alias using `TokenError`.
pub type Result<T> = std::result::Result<T, TokenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TokenError::storage("writing token", StorageError::from(io));
        assert_eq!(err.to_string(), "token storage error: writing token");
        let source = err.source().expect("source");
        assert!(source.to_string().contains("denied"));
    }

    #[test]
    fn sign_in_required_only_for_credential_errors() {
        assert!(TokenError::Expired("exp passed".to_string()).requires_sign_in());
        assert!(TokenError::Invalid("two segments".to_string()).requires_sign_in());
        let storage = TokenError::Storage {
            message: "reading token".to_string(),
            source: None,
        };
        assert!(!storage.requires_sign_in());
    }

    #[test]
    fn unavailable_displays_reason() {
        let err = StorageError::Unavailable("no secret service".to_string());
        assert_eq!(err.to_string(), "storage unavailable: no secret service");
    }
}
