//! Frame decoding with content-hash verification.

use skylark_codec::{from_cbor, ContentHash};

use crate::error::{ProtoError, ProtoResult};
use crate::frame::RawFrame;
use crate::operation::{OpKind, RepoOperation};
use crate::record::Record;

/// Turns one stream frame into ordered, hash-verified repository
/// operations.
///
/// Decoding is all-or-nothing per frame: when any block fails
/// verification the whole frame is rejected and nothing is emitted, so
/// downstream consumers never observe a partially-applied commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decodes a frame into operations in manifest order.
    ///
    /// `too_big` frames decode to an empty, error-free sequence: the
    /// host already elided their payload, and stalling the stream over
    /// them would trade a known-lossy event for no events at all.
    pub fn decode(&self, frame: &RawFrame) -> ProtoResult<Vec<RepoOperation>> {
        if frame.too_big {
            return Ok(Vec::new());
        }

        let mut operations = Vec::with_capacity(frame.ops.len());

        for entry in &frame.ops {
            let (collection, record_key) = RepoOperation::split_path(&entry.path)?;

            let (hash, record) = match entry.action {
                OpKind::Delete => (None, None),
                OpKind::Create | OpKind::Update => {
                    let declared = entry.hash.ok_or_else(|| {
                        ProtoError::invalid_frame(format!(
                            "{} without declared ref at {}",
                            entry.action.as_str(),
                            entry.path
                        ))
                    })?;

                    let bytes = frame.blocks.get(&declared).ok_or(ProtoError::MissingBlock {
                        path: entry.path.clone(),
                        hash: declared,
                    })?;

                    let computed = ContentHash::of(bytes);
                    if computed != declared {
                        return Err(ProtoError::Integrity {
                            path: entry.path.clone(),
                            declared,
                            computed,
                        });
                    }

                    let value = from_cbor(bytes)?;
                    (Some(declared), Some(Record::classify(collection, value)))
                }
            };

            operations.push(RepoOperation {
                kind: entry.action,
                collection: collection.to_string(),
                record_key: record_key.to_string(),
                account: frame.account.clone(),
                hash,
                record,
            });
        }

        Ok(operations)
    }
}
