//! Classified repository operations.

use skylark_codec::ContentHash;

use crate::error::{ProtoError, ProtoResult};
use crate::record::{Record, RecordRef};

/// The kind of mutation an operation applies to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// A record was created.
    Create,
    /// An existing record was replaced.
    Update,
    /// A record was deleted.
    Delete,
}

impl OpKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }

    /// Parses a wire action name.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "create" => Some(OpKind::Create),
            "update" => Some(OpKind::Update),
            "delete" => Some(OpKind::Delete),
            _ => None,
        }
    }

    /// Returns true for Create/Update, which carry a record block.
    pub fn carries_record(&self) -> bool {
        !matches!(self, OpKind::Delete)
    }
}

/// One decoded, verified repository mutation.
///
/// For Create/Update the record was fetched from the frame's block store
/// by its declared hash and the hash was recomputed before the operation
/// was emitted, so `hash` and `record` can be trusted together. Deletes
/// carry neither.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoOperation {
    /// Mutation kind.
    pub kind: OpKind,
    /// Collection path (e.g. `feed.post`).
    pub collection: String,
    /// Record key within the collection.
    pub record_key: String,
    /// Account whose repository was mutated.
    pub account: String,
    /// Verified content hash of the record (absent for Delete).
    pub hash: Option<ContentHash>,
    /// Decoded record (absent for Delete).
    pub record: Option<Record>,
}

impl RepoOperation {
    /// Splits a manifest path into (collection, record key).
    pub fn split_path(path: &str) -> ProtoResult<(&str, &str)> {
        match path.split_once('/') {
            Some((collection, rkey)) if !collection.is_empty() && !rkey.is_empty() => {
                Ok((collection, rkey))
            }
            _ => Err(ProtoError::InvalidPath {
                path: path.to_string(),
            }),
        }
    }

    /// The manifest path of this operation.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.record_key)
    }

    /// The full URI of the affected record.
    pub fn uri(&self) -> String {
        RecordRef::uri_for(&self.account, &self.collection, &self.record_key)
    }

    /// A strong reference to this operation's record, when it carries one.
    pub fn strong_ref(&self) -> Option<RecordRef> {
        self.hash.map(|hash| RecordRef::new(self.uri(), hash))
    }
}
