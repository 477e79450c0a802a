//! End-to-end ingestion tests over scripted transports.

use std::sync::Arc;

use regex::Regex;
use skylark_codec::ContentHash;
use skylark_proto::{BlockStore, PostRecord, RawFrame, Record};
use skylark_session::{Credential, CredentialStore, MockRpc, SessionManager};
use skylark_stream::{
    AutoReplySink, EventDispatcher, MockDialer, PatternFilterSink, PrintSink, RecordingSink,
    StopReason, StreamConsumer,
};
use tempfile::TempDir;

fn post_frame(seq: u64, account: &str, text: &str) -> RawFrame {
    let mut frame = RawFrame::new(seq, account);
    frame
        .push_create(
            format!("feed.post/3k{seq}"),
            &Record::Post(PostRecord::new(text, "2024-05-01T00:00:00Z")),
        )
        .unwrap();
    frame
}

/// Flips one byte of a frame's first block while keeping its declared
/// address, which must fail integrity verification.
fn corrupt(mut frame: RawFrame) -> RawFrame {
    let mut store = BlockStore::new();
    for (declared, bytes) in frame.blocks.iter() {
        let mut bytes = bytes.to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        store.insert(*declared, bytes.into());
    }
    assert!(!frame.blocks.is_empty(), "nothing to corrupt");
    frame.blocks = store;
    frame
}

#[test]
fn corrupt_frame_is_skipped_but_counted() {
    let dialer = MockDialer::new();
    dialer.push_frame(post_frame(10, "acct:alice", "frame ten"));
    dialer.push_frame(corrupt(post_frame(11, "acct:alice", "frame eleven")));
    dialer.push_frame(post_frame(12, "acct:alice", "frame twelve"));

    let sink = RecordingSink::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Box::new(sink.clone()));

    let consumer = StreamConsumer::new(dialer, dispatcher);
    let reason = consumer.run(None).unwrap();

    assert_eq!(reason, StopReason::RemoteClosed);

    // Frames 10 and 12 arrive; the tampered frame 11 is skipped whole,
    // but the cursor still walks past it.
    let seen = sink.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, 10);
    assert_eq!(seen[1].0, 12);
    assert_eq!(consumer.cursor(), Some(12));
}

#[test]
fn print_sink_observes_the_stream() {
    let dialer = MockDialer::new();
    dialer.push_frame(post_frame(1, "acct:alice", "hello everyone"));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Box::new(PrintSink::new(Vec::new())));

    let consumer = StreamConsumer::new(dialer, dispatcher);
    consumer.run(None).unwrap();
    assert_eq!(consumer.cursor(), Some(1));
}

#[test]
fn stop_then_resume_never_loses_position() {
    let dialer = MockDialer::new();
    dialer.push_frame(post_frame(100, "acct:alice", "first batch"));
    dialer.push_frame(post_frame(101, "acct:alice", "first batch"));

    let sink = RecordingSink::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Box::new(sink.clone()));
    let consumer = StreamConsumer::new(dialer, dispatcher);

    consumer.run(None).unwrap();
    let last_cursor = consumer.cursor();
    assert_eq!(last_cursor, Some(101));

    // Resume: the dialer sees the cursor, and everything dispatched
    // afterwards carries a sequence at or past it (at-least-once).
    consumer.run(last_cursor).unwrap();
    assert!(consumer.cursor() >= last_cursor);

    let dispatched_seqs: Vec<_> = sink.seen().iter().map(|(seq, _)| *seq).collect();
    assert!(dispatched_seqs.iter().all(|seq| *seq >= 100));
    assert!(!dispatched_seqs.is_empty());
}

#[test]
fn pattern_filtered_auto_reply_end_to_end() {
    let dir = TempDir::new().unwrap();
    let rpc = Arc::new(MockRpc::new());
    rpc.set_login_response(Ok(Credential::new("acct:me", "me.example", "acc", "ref")));
    rpc.set_refresh_response(Ok(Credential::new("acct:me", "me.example", "acc", "ref")));

    let session = Arc::new(SessionManager::new(
        CredentialStore::new(dir.path().join("me.auth")),
        Arc::clone(&rpc) as Arc<dyn skylark_session::RpcFacade>,
        "me.example",
        "secret",
    ));

    let dialer = MockDialer::new();
    dialer.push_frame(post_frame(1, "acct:alice", "my cat sings"));
    dialer.push_frame(post_frame(2, "acct:bob", "my dog barks"));

    let downstream = RecordingSink::new();
    let filter = PatternFilterSink::new(Regex::new("cat").unwrap())
        .forward_to(Box::new(downstream.clone()))
        .forward_to(Box::new(AutoReplySink::new(session, "meow indeed")));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Box::new(filter));

    let consumer = StreamConsumer::new(dialer, dispatcher);
    consumer.run(None).unwrap();

    // Only the cat post made it through the filter...
    let seen = downstream.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1.account, "acct:alice");

    // ...and the auto-reply answered it, rooted at the post itself.
    let created = rpc.created_records();
    assert_eq!(created.len(), 1);
    let reply = created[0].1.as_post().unwrap();
    assert_eq!(reply.text, "meow indeed");
    let reply_ref = reply.reply.clone().unwrap();
    assert_eq!(reply_ref.root.uri, "sky://acct:alice/feed.post/3k1");
    assert_eq!(reply_ref.root, reply_ref.parent);
}

#[test]
fn delete_operations_flow_through_untouched() {
    let mut frame = RawFrame::new(50, "acct:alice");
    frame.push_delete("feed.post/3kold");

    let dialer = MockDialer::new();
    dialer.push_frame(frame);

    let sink = RecordingSink::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Box::new(sink.clone()));

    let consumer = StreamConsumer::new(dialer, dispatcher);
    consumer.run(None).unwrap();

    let seen = sink.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1.record.is_none());
    assert!(seen[0].1.hash.is_none());
    assert_eq!(consumer.cursor(), Some(50));
}

#[test]
fn integrity_skip_does_not_disturb_hash_verified_frames() {
    // A frame whose block hashes verify passes its hash through to the
    // operations.
    let frame = post_frame(60, "acct:alice", "verified");
    let expected_hash = frame.ops[0].hash.unwrap();

    let dialer = MockDialer::new();
    dialer.push_frame(frame);

    let sink = RecordingSink::new();
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Box::new(sink.clone()));

    let consumer = StreamConsumer::new(dialer, dispatcher);
    consumer.run(None).unwrap();

    let seen = sink.seen();
    assert_eq!(seen[0].1.hash, Some(expected_hash));
    assert_eq!(
        seen[0].1.hash.unwrap(),
        ContentHash::of(
            frameless_reencode(&seen[0].1.record.clone().unwrap()).as_slice()
        )
    );
}

fn frameless_reencode(record: &Record) -> Vec<u8> {
    skylark_codec::to_canonical_cbor(&record.to_value()).unwrap()
}
