//! Error types for the protocol crate.

use skylark_codec::{CodecError, ContentHash};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtoResult<T> = Result<T, ProtoError>;

/// Errors that can occur while decoding protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// CBOR-level failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A block's bytes do not hash to their declared address.
    ///
    /// This fails the whole frame; no operations are emitted for it.
    #[error("integrity failure at {path}: declared {declared}, computed {computed}")]
    Integrity {
        /// Manifest path of the offending operation.
        path: String,
        /// Address the manifest declared.
        declared: ContentHash,
        /// Address recomputed from the block bytes.
        computed: ContentHash,
    },

    /// The manifest references a block the frame does not carry.
    #[error("missing block for {path}: {hash}")]
    MissingBlock {
        /// Manifest path of the offending operation.
        path: String,
        /// Address that could not be resolved.
        hash: ContentHash,
    },

    /// The frame envelope is structurally invalid.
    #[error("invalid frame: {message}")]
    InvalidFrame {
        /// Description of the problem.
        message: String,
    },

    /// A manifest path is not of the form `collection/record-key`.
    #[error("invalid record path: {path:?}")]
    InvalidPath {
        /// The offending path.
        path: String,
    },

    /// A record reference URI could not be parsed.
    #[error("invalid record uri: {uri:?}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
    },
}

impl ProtoError {
    /// Create an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Returns true if this error means the frame's content could not be
    /// trusted (as opposed to being structurally unreadable).
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            ProtoError::Integrity { .. } | ProtoError::MissingBlock { .. }
        )
    }
}
