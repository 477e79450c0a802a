//! Stream frames and their content-addressed block store.

use bytes::Bytes;
use skylark_codec::{from_cbor, to_canonical_cbor, ContentHash, Value};

use crate::error::{ProtoError, ProtoResult};
use crate::operation::OpKind;
use crate::record::Record;

/// A content-addressed hash→bytes mapping carried inside one frame.
///
/// Blocks are keyed by the address the frame *declares* for them; the
/// decoder recomputes the address from the bytes before trusting a
/// block, so a store lookup alone proves nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockStore {
    blocks: Vec<(ContentHash, Bytes)>,
}

impl BlockStore {
    /// Creates an empty block store.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Inserts a block under its declared address.
    pub fn insert(&mut self, hash: ContentHash, bytes: Bytes) {
        self.blocks.push((hash, bytes));
    }

    /// Looks up a block by declared address.
    pub fn get(&self, hash: &ContentHash) -> Option<&Bytes> {
        self.blocks
            .iter()
            .find(|(declared, _)| declared == hash)
            .map(|(_, bytes)| bytes)
    }

    /// Number of blocks carried.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the store carries no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over (declared address, bytes) pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(ContentHash, Bytes)> + '_ {
        self.blocks.iter()
    }
}

/// One entry of a frame's operation manifest, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Mutation kind.
    pub action: OpKind,
    /// Record path (`collection/record-key`).
    pub path: String,
    /// Declared block address (absent for Delete).
    pub hash: Option<ContentHash>,
}

/// One atomic commit against a repository, as read off the stream.
///
/// A frame is consumed exactly once: decoded into operations, or skipped
/// wholesale when it is marked `too_big` or fails verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Stream sequence number of this commit.
    pub seq: u64,
    /// Account whose repository the commit mutates.
    pub account: String,
    /// Set when the host elided the block payload for size; such frames
    /// are lossy by design and decode to nothing.
    pub too_big: bool,
    /// Declared operations in commit order.
    pub ops: Vec<ManifestEntry>,
    /// Blocks referenced by the manifest.
    pub blocks: BlockStore,
}

impl RawFrame {
    /// Creates an empty frame for the given sequence and account.
    pub fn new(seq: u64, account: impl Into<String>) -> Self {
        Self {
            seq,
            account: account.into(),
            too_big: false,
            ops: Vec::new(),
            blocks: BlockStore::new(),
        }
    }

    /// Creates a frame whose payload was elided by the host.
    pub fn too_big(seq: u64, account: impl Into<String>) -> Self {
        Self {
            seq,
            account: account.into(),
            too_big: true,
            ops: Vec::new(),
            blocks: BlockStore::new(),
        }
    }

    /// Appends a Create operation, encoding the record into the block
    /// store under its computed address.
    pub fn push_create(&mut self, path: impl Into<String>, record: &Record) -> ProtoResult<()> {
        self.push_with_record(OpKind::Create, path.into(), record)
    }

    /// Appends an Update operation, encoding the record into the block
    /// store under its computed address.
    pub fn push_update(&mut self, path: impl Into<String>, record: &Record) -> ProtoResult<()> {
        self.push_with_record(OpKind::Update, path.into(), record)
    }

    /// Appends a Delete operation.
    pub fn push_delete(&mut self, path: impl Into<String>) {
        self.ops.push(ManifestEntry {
            action: OpKind::Delete,
            path: path.into(),
            hash: None,
        });
    }

    fn push_with_record(&mut self, action: OpKind, path: String, record: &Record) -> ProtoResult<()> {
        let bytes = to_canonical_cbor(&record.to_value())?;
        let hash = ContentHash::of(&bytes);
        self.blocks.insert(hash, Bytes::from(bytes));
        self.ops.push(ManifestEntry {
            action,
            path,
            hash: Some(hash),
        });
        Ok(())
    }

    /// Encodes this frame to its canonical CBOR envelope.
    pub fn encode(&self) -> ProtoResult<Vec<u8>> {
        let ops: Vec<Value> = self
            .ops
            .iter()
            .map(|op| {
                let mut pairs = vec![
                    (
                        Value::Text("action".into()),
                        Value::Text(op.action.as_str().into()),
                    ),
                    (Value::Text("path".into()), Value::Text(op.path.clone())),
                ];
                if let Some(hash) = op.hash {
                    pairs.push((Value::Text("ref".into()), Value::Link(hash)));
                }
                Value::map(pairs)
            })
            .collect();

        let blocks: Vec<Value> = self
            .blocks
            .iter()
            .map(|(hash, bytes)| {
                Value::map(vec![
                    (Value::Text("ref".into()), Value::Link(*hash)),
                    (Value::Text("data".into()), Value::Bytes(bytes.to_vec())),
                ])
            })
            .collect();

        let pairs = vec![
            (Value::Text("seq".into()), Value::Integer(self.seq as i64)),
            (
                Value::Text("account".into()),
                Value::Text(self.account.clone()),
            ),
            (Value::Text("tooBig".into()), Value::Bool(self.too_big)),
            (Value::Text("ops".into()), Value::Array(ops)),
            (Value::Text("blocks".into()), Value::Array(blocks)),
        ];

        Ok(to_canonical_cbor(&Value::map(pairs))?)
    }

    /// Decodes a frame from its CBOR envelope.
    pub fn decode(bytes: &[u8]) -> ProtoResult<Self> {
        let value = from_cbor(bytes)?;
        let map = value
            .as_map()
            .ok_or_else(|| ProtoError::invalid_frame("expected map envelope"))?;

        let get_field = |name: &str| {
            map.iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v)
        };

        let seq = get_field("seq")
            .and_then(|v: &Value| v.as_integer())
            .ok_or_else(|| ProtoError::invalid_frame("missing seq"))?;
        let seq = u64::try_from(seq).map_err(|_| ProtoError::invalid_frame("negative seq"))?;

        let account = get_field("account")
            .and_then(|v: &Value| v.as_text())
            .ok_or_else(|| ProtoError::invalid_frame("missing account"))?
            .to_string();

        let too_big = get_field("tooBig")
            .and_then(|v: &Value| v.as_bool())
            .unwrap_or(false);

        let ops = get_field("ops")
            .and_then(|v: &Value| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        let action = entry
                            .get("action")
                            .and_then(Value::as_text)
                            .and_then(OpKind::from_action)
                            .ok_or_else(|| ProtoError::invalid_frame("bad op action"))?;
                        let path = entry
                            .get("path")
                            .and_then(Value::as_text)
                            .ok_or_else(|| ProtoError::invalid_frame("missing op path"))?
                            .to_string();
                        let hash = entry.get("ref").and_then(Value::as_link);
                        Ok(ManifestEntry { action, path, hash })
                    })
                    .collect::<ProtoResult<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let mut blocks = BlockStore::new();
        if let Some(entries) = get_field("blocks").and_then(|v: &Value| v.as_array()) {
            for entry in entries {
                let hash = entry
                    .get("ref")
                    .and_then(Value::as_link)
                    .ok_or_else(|| ProtoError::invalid_frame("block without ref"))?;
                let data = entry
                    .get("data")
                    .and_then(Value::as_bytes)
                    .ok_or_else(|| ProtoError::invalid_frame("block without data"))?;
                blocks.insert(hash, Bytes::copy_from_slice(data));
            }
        }

        Ok(Self {
            seq,
            account,
            too_big,
            ops,
            blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PostRecord;

    #[test]
    fn envelope_roundtrip() {
        let mut frame = RawFrame::new(42, "acct:alice");
        frame
            .push_create(
                "feed.post/3k1",
                &Record::Post(PostRecord::new("hello", "2024-05-01T00:00:00Z")),
            )
            .unwrap();
        frame.push_delete("feed.like/3k0");

        let bytes = frame.encode().unwrap();
        let decoded = RawFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn too_big_roundtrip() {
        let frame = RawFrame::too_big(7, "acct:bob");
        let decoded = RawFrame::decode(&frame.encode().unwrap()).unwrap();
        assert!(decoded.too_big);
        assert_eq!(decoded.seq, 7);
        assert!(decoded.ops.is_empty());
        assert!(decoded.blocks.is_empty());
    }

    #[test]
    fn push_create_stores_block_under_computed_address() {
        let record = Record::Post(PostRecord::new("hello", "2024-05-01T00:00:00Z"));
        let mut frame = RawFrame::new(1, "acct:alice");
        frame.push_create("feed.post/3k1", &record).unwrap();

        let declared = frame.ops[0].hash.unwrap();
        let bytes = frame.blocks.get(&declared).unwrap();
        assert_eq!(ContentHash::of(bytes), declared);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(RawFrame::decode(&[0x01]).is_err());
        assert!(RawFrame::decode(&[0xff]).is_err());
    }

    #[test]
    fn block_store_lookup() {
        let mut store = BlockStore::new();
        let hash = ContentHash::of(b"data");
        store.insert(hash, Bytes::from_static(b"data"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&hash).unwrap().as_ref(), b"data");
        assert!(store.get(&ContentHash::of(b"other")).is_none());
    }
}
