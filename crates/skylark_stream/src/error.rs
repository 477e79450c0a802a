//! Error types for the stream consumer.

use thiserror::Error;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while consuming the event stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Connection-level failure. Terminates streaming; the last
    /// advanced cursor remains available for resumption.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether reconnecting is worth attempting.
        retryable: bool,
    },

    /// The connection handshake was rejected.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The consumer was asked to start while already running.
    #[error("consumer is already streaming")]
    AlreadyStreaming,
}

impl StreamError {
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

    /// Returns true if reconnecting may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// An error raised by one sink for one operation.
///
/// Sink errors are operation-scoped: the dispatcher logs them and moves
/// on, so a misbehaving sink can never stall ingestion or starve the
/// other sinks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sink error: {0}")]
pub struct SinkError(String);

impl SinkError {
    /// Creates a sink error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<skylark_session::SessionError> for SinkError {
    fn from(err: skylark_session::SessionError) -> Self {
        Self(err.to_string())
    }
}
