//! Built-in sinks.

use std::io::Write;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use regex::Regex;
use skylark_proto::{collections, OpKind, PostRecord, Record, RepoOperation};
use skylark_session::SessionManager;
use tracing::warn;

use crate::dispatcher::{Sink, SinkOutcome, SinkResult};
use crate::error::SinkError;

/// Renders every operation human-readably to an injected writer.
///
/// The writer is a constructor argument rather than ambient stdout so
/// the sink stays testable and callers decide where output lands.
pub struct PrintSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> PrintSink<W> {
    /// Creates a print sink over the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for PrintSink<W> {
    fn name(&self) -> &str {
        "print"
    }

    fn consume(&mut self, operation: &RepoOperation, seq: u64) -> SinkResult {
        let verb = operation.kind.as_str();
        let result = match &operation.record {
            Some(Record::Post(post)) => writeln!(
                self.writer,
                "[{seq}] {} {verb} {}: {:?}",
                operation.account,
                operation.path(),
                post.text,
            ),
            Some(Record::Repost(repost)) => writeln!(
                self.writer,
                "[{seq}] {} {verb} {}: repost of {}",
                operation.account,
                operation.path(),
                repost.subject.uri,
            ),
            Some(Record::Like(like)) => writeln!(
                self.writer,
                "[{seq}] {} {verb} {}: like of {}",
                operation.account,
                operation.path(),
                like.subject.uri,
            ),
            Some(Record::Follow(follow)) => writeln!(
                self.writer,
                "[{seq}] {} {verb} {}: follow {}",
                operation.account,
                operation.path(),
                follow.subject,
            ),
            // Unrecognized records still surface, in raw form.
            Some(Record::Unknown(value)) => writeln!(
                self.writer,
                "[{seq}] {} {verb} {}: {value:?}",
                operation.account,
                operation.path(),
            ),
            None => writeln!(
                self.writer,
                "[{seq}] {} {verb} {}",
                operation.account,
                operation.path(),
            ),
        };

        result.map_err(|err| SinkError::new(err.to_string()))?;
        Ok(SinkOutcome::Delivered)
    }
}

/// Drops operations whose record text fails a pattern, forwarding the
/// rest to its downstream sinks.
///
/// Operations without text (deletes, likes, unrecognized records) never
/// match and are filtered.
pub struct PatternFilterSink {
    pattern: Regex,
    downstream: Vec<Box<dyn Sink>>,
}

impl PatternFilterSink {
    /// Creates a filter with no downstream sinks.
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            downstream: Vec::new(),
        }
    }

    /// Adds a downstream sink, preserving registration order.
    pub fn forward_to(mut self, sink: Box<dyn Sink>) -> Self {
        self.downstream.push(sink);
        self
    }
}

impl Sink for PatternFilterSink {
    fn name(&self) -> &str {
        "pattern-filter"
    }

    fn consume(&mut self, operation: &RepoOperation, seq: u64) -> SinkResult {
        let matched = operation
            .record
            .as_ref()
            .and_then(Record::text)
            .is_some_and(|text| self.pattern.is_match(text));

        if !matched {
            return Ok(SinkOutcome::Filtered);
        }

        for sink in &mut self.downstream {
            if let Err(err) = sink.consume(operation, seq) {
                // Same policy as the dispatcher: one bad sink must not
                // stop the rest.
                warn!(sink = sink.name(), seq, error = %err, "downstream sink failed");
            }
        }
        Ok(SinkOutcome::Delivered)
    }
}

/// Replies to every created post it sees, through the session manager.
///
/// The reply's thread-root follows the target's declared root when the
/// target is itself a reply, else the target is treated as its own
/// root. The sink's own account is excluded, otherwise it would answer
/// its replies forever.
pub struct AutoReplySink {
    session: Arc<SessionManager>,
    reply_text: String,
}

impl AutoReplySink {
    /// Creates an auto-reply sink posting `reply_text`.
    pub fn new(session: Arc<SessionManager>, reply_text: impl Into<String>) -> Self {
        Self {
            session,
            reply_text: reply_text.into(),
        }
    }
}

impl Sink for AutoReplySink {
    fn name(&self) -> &str {
        "auto-reply"
    }

    fn consume(&mut self, operation: &RepoOperation, _seq: u64) -> SinkResult {
        if operation.kind != OpKind::Create {
            return Ok(SinkOutcome::Filtered);
        }
        let Some(Record::Post(post)) = &operation.record else {
            return Ok(SinkOutcome::Filtered);
        };
        let Some(target) = operation.strong_ref() else {
            return Ok(SinkOutcome::Filtered);
        };

        let credential = self.session.acquire()?;
        if credential.account == operation.account {
            return Ok(SinkOutcome::Filtered);
        }

        let reply = Record::Post(PostRecord::reply_to(
            self.reply_text.clone(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            target,
            post.reply.as_ref(),
        ));

        self.session
            .rpc()
            .create_record(&credential, collections::POST, &reply)?;
        Ok(SinkOutcome::Delivered)
    }
}

/// Records everything it consumes; for tests and dry runs.
#[derive(Clone, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<(u64, RepoOperation)>>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything consumed so far, in order.
    pub fn seen(&self) -> Vec<(u64, RepoOperation)> {
        self.seen.lock().clone()
    }
}

impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn consume(&mut self, operation: &RepoOperation, seq: u64) -> SinkResult {
        self.seen.lock().push((seq, operation.clone()));
        Ok(SinkOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylark_codec::ContentHash;
    use skylark_proto::{RecordRef, ReplyRef};
    use skylark_session::{Credential, CredentialStore, MockRpc};
    use tempfile::TempDir;

    fn post_op(account: &str, rkey: &str, text: &str, reply: Option<ReplyRef>) -> RepoOperation {
        let record = PostRecord {
            text: text.into(),
            created_at: "2024-05-01T00:00:00Z".into(),
            reply,
        };
        RepoOperation {
            kind: OpKind::Create,
            collection: collections::POST.into(),
            record_key: rkey.into(),
            account: account.into(),
            hash: Some(ContentHash::of(text.as_bytes())),
            record: Some(Record::Post(record)),
        }
    }

    fn delete_op(account: &str) -> RepoOperation {
        RepoOperation {
            kind: OpKind::Delete,
            collection: collections::POST.into(),
            record_key: "3kdel".into(),
            account: account.into(),
            hash: None,
            record: None,
        }
    }

    fn session(dir: &TempDir, rpc: Arc<MockRpc>) -> Arc<SessionManager> {
        rpc.set_login_response(Ok(Credential::new("acct:me", "me.example", "acc", "ref")));
        rpc.set_refresh_response(Ok(Credential::new("acct:me", "me.example", "acc", "ref")));
        Arc::new(SessionManager::new(
            CredentialStore::new(dir.path().join("me.auth")),
            rpc,
            "me.example",
            "secret",
        ))
    }

    #[test]
    fn print_sink_renders_posts() {
        let mut sink = PrintSink::new(Vec::new());
        sink.consume(&post_op("acct:alice", "3k1", "hello sky", None), 42)
            .unwrap();
        sink.consume(&delete_op("acct:alice"), 43).unwrap();

        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("[42] acct:alice create feed.post/3k1"));
        assert!(output.contains("hello sky"));
        assert!(output.contains("[43] acct:alice delete feed.post/3kdel"));
    }

    #[test]
    fn pattern_filter_forwards_matches_only() {
        let downstream = RecordingSink::new();
        let mut filter = PatternFilterSink::new(Regex::new("cat").unwrap())
            .forward_to(Box::new(downstream.clone()));

        let outcome = filter
            .consume(&post_op("acct:alice", "3k1", "I like cats", None), 1)
            .unwrap();
        assert_eq!(outcome, SinkOutcome::Delivered);

        let outcome = filter
            .consume(&post_op("acct:alice", "3k2", "I like dogs", None), 2)
            .unwrap();
        assert_eq!(outcome, SinkOutcome::Filtered);

        let seen = downstream.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1.record.as_ref().unwrap().text(), Some("I like cats"));
    }

    #[test]
    fn pattern_filter_drops_textless_operations() {
        let downstream = RecordingSink::new();
        let mut filter = PatternFilterSink::new(Regex::new(".*").unwrap())
            .forward_to(Box::new(downstream.clone()));

        let outcome = filter.consume(&delete_op("acct:alice"), 1).unwrap();
        assert_eq!(outcome, SinkOutcome::Filtered);
        assert!(downstream.seen().is_empty());
    }

    #[test]
    fn auto_reply_uses_target_as_root_for_top_level_posts() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        let mut sink = AutoReplySink::new(session(&dir, Arc::clone(&rpc)), "welcome!");

        let target = post_op("acct:alice", "3k1", "first post", None);
        let outcome = sink.consume(&target, 10).unwrap();
        assert_eq!(outcome, SinkOutcome::Delivered);

        let created = rpc.created_records();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, collections::POST);

        let reply = created[0].1.as_post().unwrap().reply.clone().unwrap();
        let expected = target.strong_ref().unwrap();
        assert_eq!(reply.root, expected);
        assert_eq!(reply.parent, expected);
    }

    #[test]
    fn auto_reply_propagates_declared_root() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        let mut sink = AutoReplySink::new(session(&dir, Arc::clone(&rpc)), "me too");

        let thread_root = RecordRef::new(
            "sky://acct:bob/feed.post/3kroot",
            ContentHash::of(b"thread root"),
        );
        let target_reply = ReplyRef {
            root: thread_root.clone(),
            parent: RecordRef::new(
                "sky://acct:carol/feed.post/3kmid",
                ContentHash::of(b"mid thread"),
            ),
        };
        let target = post_op("acct:alice", "3k2", "deep in a thread", Some(target_reply));

        sink.consume(&target, 11).unwrap();

        let created = rpc.created_records();
        let reply = created[0].1.as_post().unwrap().reply.clone().unwrap();
        // Root comes from the target's declared root, not from its parent.
        assert_eq!(reply.root, thread_root);
        assert_eq!(reply.parent, target.strong_ref().unwrap());
    }

    #[test]
    fn auto_reply_never_answers_itself() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        let mut sink = AutoReplySink::new(session(&dir, Arc::clone(&rpc)), "hi");

        let own_post = post_op("acct:me", "3k3", "my own post", None);
        let outcome = sink.consume(&own_post, 12).unwrap();

        assert_eq!(outcome, SinkOutcome::Filtered);
        assert!(rpc.created_records().is_empty());
    }

    #[test]
    fn auto_reply_ignores_non_posts_and_deletes() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        let mut sink = AutoReplySink::new(session(&dir, Arc::clone(&rpc)), "hi");

        assert_eq!(
            sink.consume(&delete_op("acct:alice"), 13).unwrap(),
            SinkOutcome::Filtered
        );
        assert!(rpc.created_records().is_empty());
    }

    #[test]
    fn auto_reply_surfaces_session_failure_as_sink_error() {
        let dir = TempDir::new().unwrap();
        let rpc = Arc::new(MockRpc::new());
        rpc.set_login_response(Err(skylark_session::SessionError::Authentication(
            "bad secret".into(),
        )));
        let session = Arc::new(SessionManager::new(
            CredentialStore::new(dir.path().join("me.auth")),
            rpc,
            "me.example",
            "wrong",
        ));
        let mut sink = AutoReplySink::new(session, "hi");

        let result = sink.consume(&post_op("acct:alice", "3k4", "hello", None), 14);
        assert!(result.is_err());
    }
}
