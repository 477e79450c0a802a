//! Typed repository records.

use skylark_codec::{ContentHash, Value};

use crate::error::{ProtoError, ProtoResult};

/// Well-known collection paths.
pub mod collections {
    /// A post in an account's feed.
    pub const POST: &str = "feed.post";
    /// A repost of an existing post.
    pub const REPOST: &str = "feed.repost";
    /// A like on an existing post.
    pub const LIKE: &str = "feed.like";
    /// A follow edge to another account.
    pub const FOLLOW: &str = "graph.follow";
}

/// A strong reference to a record: its URI plus the content hash it had
/// when the reference was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    /// Record URI (`sky://account/collection/record-key`).
    pub uri: String,
    /// Content hash of the referenced record.
    pub hash: ContentHash,
}

impl RecordRef {
    /// Creates a strong reference.
    pub fn new(uri: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            uri: uri.into(),
            hash,
        }
    }

    /// Builds the URI for a record held by `account` at `collection/rkey`.
    pub fn uri_for(account: &str, collection: &str, rkey: &str) -> String {
        format!("sky://{account}/{collection}/{rkey}")
    }

    /// Splits a record URI into (account, collection, record key).
    pub fn parse_uri(uri: &str) -> ProtoResult<(String, String, String)> {
        let rest = uri.strip_prefix("sky://").ok_or_else(|| ProtoError::InvalidUri {
            uri: uri.to_string(),
        })?;
        let mut parts = rest.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(account), Some(collection), Some(rkey))
                if !account.is_empty() && !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok((account.to_string(), collection.to_string(), rkey.to_string()))
            }
            _ => Err(ProtoError::InvalidUri {
                uri: uri.to_string(),
            }),
        }
    }

    /// Converts to a CBOR value.
    pub fn to_value(&self) -> Value {
        Value::map(vec![
            (Value::Text("uri".into()), Value::Text(self.uri.clone())),
            (Value::Text("ref".into()), Value::Link(self.hash)),
        ])
    }

    /// Reads a strong reference out of a CBOR value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let uri = value.get("uri")?.as_text()?.to_string();
        let hash = value.get("ref")?.as_link()?;
        Some(Self { uri, hash })
    }
}

/// The thread position of a reply: the root of the thread and the post
/// being answered directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRef {
    /// Root of the thread.
    pub root: RecordRef,
    /// Immediate parent.
    pub parent: RecordRef,
}

impl ReplyRef {
    /// Builds the reply reference for answering `target`.
    ///
    /// The parent is always the target itself. The root follows the
    /// target's own declared root when the target is itself a reply;
    /// otherwise the target starts the thread and is its own root. Root
    /// propagation (not parent propagation) is what keeps every reply in
    /// a thread pointing at the same root.
    pub fn for_target(target: RecordRef, target_reply: Option<&ReplyRef>) -> Self {
        let root = match target_reply {
            Some(reply) => reply.root.clone(),
            None => target.clone(),
        };
        Self {
            root,
            parent: target,
        }
    }

    /// Converts to a CBOR value.
    pub fn to_value(&self) -> Value {
        Value::map(vec![
            (Value::Text("root".into()), self.root.to_value()),
            (Value::Text("parent".into()), self.parent.to_value()),
        ])
    }

    /// Reads a reply reference out of a CBOR value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let root = RecordRef::from_value(value.get("root")?)?;
        let parent = RecordRef::from_value(value.get("parent")?)?;
        Some(Self { root, parent })
    }
}

/// A feed post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    /// Post text.
    pub text: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Thread position, when the post is a reply.
    pub reply: Option<ReplyRef>,
}

impl PostRecord {
    /// Creates a top-level post.
    pub fn new(text: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            created_at: created_at.into(),
            reply: None,
        }
    }

    /// Creates a reply to `target`.
    pub fn reply_to(
        text: impl Into<String>,
        created_at: impl Into<String>,
        target: RecordRef,
        target_reply: Option<&ReplyRef>,
    ) -> Self {
        Self {
            text: text.into(),
            created_at: created_at.into(),
            reply: Some(ReplyRef::for_target(target, target_reply)),
        }
    }
}

/// A repost of an existing post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepostRecord {
    /// The reposted post.
    pub subject: RecordRef,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// A like on an existing post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeRecord {
    /// The liked post.
    pub subject: RecordRef,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// A follow edge to another account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowRecord {
    /// Account being followed.
    pub subject: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// A decoded repository record.
///
/// The variant set is closed over what the client understands;
/// everything else lands in `Unknown`, which is deliberately an explicit
/// member of the union rather than a silently-dropped default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A feed post.
    Post(PostRecord),
    /// A repost.
    Repost(RepostRecord),
    /// A like.
    Like(LikeRecord),
    /// A follow.
    Follow(FollowRecord),
    /// Anything the client does not recognize, kept in raw form.
    Unknown(Value),
}

impl Record {
    /// Classifies a decoded block by its collection path.
    ///
    /// A block in a known collection whose shape does not match the
    /// expected record is classified as `Unknown` rather than rejected:
    /// schema evolution on the network must not break consumers.
    pub fn classify(collection: &str, value: Value) -> Self {
        match collection {
            collections::POST => Self::post_from_value(&value)
                .map(Record::Post)
                .unwrap_or(Record::Unknown(value)),
            collections::REPOST => Self::repost_from_value(&value)
                .map(Record::Repost)
                .unwrap_or(Record::Unknown(value)),
            collections::LIKE => Self::like_from_value(&value)
                .map(Record::Like)
                .unwrap_or(Record::Unknown(value)),
            collections::FOLLOW => Self::follow_from_value(&value)
                .map(Record::Follow)
                .unwrap_or(Record::Unknown(value)),
            _ => Record::Unknown(value),
        }
    }

    /// Converts to the CBOR value this record encodes as.
    pub fn to_value(&self) -> Value {
        match self {
            Record::Post(post) => {
                let mut pairs = vec![
                    (Value::Text("text".into()), Value::Text(post.text.clone())),
                    (
                        Value::Text("createdAt".into()),
                        Value::Text(post.created_at.clone()),
                    ),
                ];
                if let Some(ref reply) = post.reply {
                    pairs.push((Value::Text("reply".into()), reply.to_value()));
                }
                Value::map(pairs)
            }
            Record::Repost(repost) => Value::map(vec![
                (Value::Text("subject".into()), repost.subject.to_value()),
                (
                    Value::Text("createdAt".into()),
                    Value::Text(repost.created_at.clone()),
                ),
            ]),
            Record::Like(like) => Value::map(vec![
                (Value::Text("subject".into()), like.subject.to_value()),
                (
                    Value::Text("createdAt".into()),
                    Value::Text(like.created_at.clone()),
                ),
            ]),
            Record::Follow(follow) => Value::map(vec![
                (
                    Value::Text("subject".into()),
                    Value::Text(follow.subject.clone()),
                ),
                (
                    Value::Text("createdAt".into()),
                    Value::Text(follow.created_at.clone()),
                ),
            ]),
            Record::Unknown(value) => value.clone(),
        }
    }

    /// Returns the post, when this record is one.
    pub fn as_post(&self) -> Option<&PostRecord> {
        match self {
            Record::Post(post) => Some(post),
            _ => None,
        }
    }

    /// Returns the human-visible text of this record, when it has any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Record::Post(post) => Some(&post.text),
            _ => None,
        }
    }

    /// Short label for rendering.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Record::Post(_) => "post",
            Record::Repost(_) => "repost",
            Record::Like(_) => "like",
            Record::Follow(_) => "follow",
            Record::Unknown(_) => "unknown",
        }
    }

    fn post_from_value(value: &Value) -> Option<PostRecord> {
        let text = value.get("text")?.as_text()?.to_string();
        let created_at = value.get("createdAt")?.as_text()?.to_string();
        let reply = match value.get("reply") {
            Some(reply_value) => Some(ReplyRef::from_value(reply_value)?),
            None => None,
        };
        Some(PostRecord {
            text,
            created_at,
            reply,
        })
    }

    fn repost_from_value(value: &Value) -> Option<RepostRecord> {
        Some(RepostRecord {
            subject: RecordRef::from_value(value.get("subject")?)?,
            created_at: value.get("createdAt")?.as_text()?.to_string(),
        })
    }

    fn like_from_value(value: &Value) -> Option<LikeRecord> {
        Some(LikeRecord {
            subject: RecordRef::from_value(value.get("subject")?)?,
            created_at: value.get("createdAt")?.as_text()?.to_string(),
        })
    }

    fn follow_from_value(value: &Value) -> Option<FollowRecord> {
        Some(FollowRecord {
            subject: value.get("subject")?.as_text()?.to_string(),
            created_at: value.get("createdAt")?.as_text()?.to_string(),
        })
    }
}
