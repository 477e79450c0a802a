//! Error types for session management.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur during session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Login was rejected. Fatal to the calling operation; never
    /// auto-retried, the caller must re-invoke `acquire()`.
    #[error("authentication failed: {0}; re-run login with valid credentials")]
    Authentication(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The credential file could not be read or written.
    #[error("credential store error: {message}")]
    Store {
        /// Error message.
        message: String,
    },

    /// The remote answered with something the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Transport { retryable, .. } => *retryable,
            SessionError::Authentication(_) => false,
            _ => false,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::store(err.to_string())
    }
}
