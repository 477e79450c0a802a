//! The read→decode→dispatch ingestion loop.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use skylark_proto::FrameDecoder;
use tracing::{debug, warn};

use crate::dispatcher::EventDispatcher;
use crate::error::{StreamError, StreamResult};
use crate::transport::StreamDialer;

/// Where the consumer currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// No connection.
    Disconnected,
    /// Connection being opened.
    Connecting,
    /// Reading frames.
    Streaming,
    /// Stop requested; finishing in-flight work.
    Draining,
    /// Stopped cleanly.
    Closed,
}

/// Why a `run` ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Cancelled,
    /// The remote closed the connection cleanly.
    RemoteClosed,
}

/// Owns one stream connection and drives ingestion over it.
///
/// Ingestion is strictly sequential: a frame is fully decoded and
/// dispatched before the next is read, which preserves the per-account
/// ordering the protocol guarantees. The cursor advances only after a
/// frame's dispatch returns, so a crash between dispatch and advance
/// redelivers that frame on resume (at-least-once; sinks must be
/// idempotent).
pub struct StreamConsumer<D: StreamDialer> {
    dialer: D,
    decoder: FrameDecoder,
    dispatcher: Mutex<EventDispatcher>,
    state: RwLock<ConsumerState>,
    cursor: RwLock<Option<u64>>,
    cancelled: AtomicBool,
}

impl<D: StreamDialer> StreamConsumer<D> {
    /// Creates a consumer over the given dialer and sinks.
    pub fn new(dialer: D, dispatcher: EventDispatcher) -> Self {
        Self {
            dialer,
            decoder: FrameDecoder::new(),
            dispatcher: Mutex::new(dispatcher),
            state: RwLock::new(ConsumerState::Disconnected),
            cursor: RwLock::new(None),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConsumerState {
        *self.state.read()
    }

    /// Sequence number of the last processed frame, for resumption.
    ///
    /// Never decreases. Valid whether the run ended cleanly, by error,
    /// or by `stop()`.
    pub fn cursor(&self) -> Option<u64> {
        *self.cursor.read()
    }

    /// Requests a stop. Safe to call from any thread; the ingestion
    /// loop checks before each read and before each dispatch, so
    /// shutdown latency is bounded by one frame's handling.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Connects and runs the ingestion loop until the stream ends.
    ///
    /// `resume_cursor` is forwarded to the dialer and pre-loads the
    /// cursor, so even a run that fails before its first frame reports
    /// a meaningful resume position. Connection-level errors surface as
    /// `StreamError::Transport` after the state drops back to
    /// `Disconnected`; reconnecting is the caller's policy, not ours.
    pub fn run(&self, resume_cursor: Option<u64>) -> StreamResult<StopReason> {
        {
            let mut state = self.state.write();
            if matches!(
                *state,
                ConsumerState::Connecting | ConsumerState::Streaming | ConsumerState::Draining
            ) {
                return Err(StreamError::AlreadyStreaming);
            }
            *state = ConsumerState::Connecting;
        }
        self.cancelled.store(false, Ordering::SeqCst);

        if let Some(cursor) = resume_cursor {
            self.advance_cursor(cursor);
        }

        let mut connection = match self.dialer.dial(resume_cursor) {
            Ok(connection) => connection,
            Err(err) => {
                self.set_state(ConsumerState::Disconnected);
                return Err(err);
            }
        };
        self.set_state(ConsumerState::Streaming);
        debug!(resume = ?resume_cursor, "streaming");

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let frame = match connection.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    connection.close();
                    self.set_state(ConsumerState::Disconnected);
                    return Ok(StopReason::RemoteClosed);
                }
                Err(err) => {
                    connection.close();
                    self.set_state(ConsumerState::Disconnected);
                    warn!(cursor = ?self.cursor(), error = %err, "stream terminated");
                    return Err(err);
                }
            };

            match self.decoder.decode(&frame) {
                Ok(operations) => {
                    if self.cancelled.load(Ordering::SeqCst) {
                        // Stop requested between read and dispatch; the
                        // frame will be redelivered on resume.
                        break;
                    }
                    if !operations.is_empty() {
                        let summary = self.dispatcher.lock().dispatch(&operations, frame.seq);
                        debug!(
                            seq = frame.seq,
                            delivered = summary.delivered,
                            filtered = summary.filtered,
                            errors = summary.errors,
                            "frame dispatched",
                        );
                    }
                    self.advance_cursor(frame.seq);
                }
                Err(err) => {
                    // One corrupt frame must never stall the stream:
                    // skip it and keep the cursor moving. Visible only
                    // under verbose logging.
                    debug!(seq = frame.seq, error = %err, "skipping undecodable frame");
                    self.advance_cursor(frame.seq);
                }
            }
        }

        self.set_state(ConsumerState::Draining);
        connection.close();
        self.set_state(ConsumerState::Closed);
        Ok(StopReason::Cancelled)
    }

    fn advance_cursor(&self, seq: u64) {
        let mut cursor = self.cursor.write();
        match *cursor {
            Some(current) if current >= seq => {}
            _ => *cursor = Some(seq),
        }
    }

    fn set_state(&self, state: ConsumerState) {
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::transport::{MockDialer, ScriptedEvent};
    use skylark_proto::{PostRecord, RawFrame, Record};
    use std::sync::Arc;

    fn frame(seq: u64, text: &str) -> RawFrame {
        let mut frame = RawFrame::new(seq, "acct:alice");
        frame
            .push_create(
                format!("feed.post/3k{seq}"),
                &Record::Post(PostRecord::new(text, "2024-05-01T00:00:00Z")),
            )
            .unwrap();
        frame
    }

    fn consumer_with(
        dialer: MockDialer,
        sink: RecordingSink,
    ) -> StreamConsumer<MockDialer> {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Box::new(sink));
        StreamConsumer::new(dialer, dispatcher)
    }

    #[test]
    fn dispatches_frames_and_advances_cursor() {
        let dialer = MockDialer::new();
        dialer.push_frame(frame(10, "one"));
        dialer.push_frame(frame(11, "two"));

        let sink = RecordingSink::new();
        let consumer = consumer_with(dialer, sink.clone());

        let reason = consumer.run(None).unwrap();
        assert_eq!(reason, StopReason::RemoteClosed);
        assert_eq!(consumer.cursor(), Some(11));
        assert_eq!(consumer.state(), ConsumerState::Disconnected);

        let seen = sink.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 10);
        assert_eq!(seen[1].0, 11);
    }

    #[test]
    fn transport_error_terminates_but_keeps_cursor() {
        let dialer = MockDialer::new();
        dialer.push_frame(frame(5, "before the cut"));
        dialer.push(ScriptedEvent::Error("connection reset".into()));

        let consumer = consumer_with(dialer, RecordingSink::new());

        let result = consumer.run(None);
        assert!(matches!(result, Err(StreamError::Transport { .. })));
        assert_eq!(consumer.cursor(), Some(5));
        assert_eq!(consumer.state(), ConsumerState::Disconnected);
    }

    #[test]
    fn resume_cursor_reaches_dialer_and_preloads_cursor() {
        let dialer = MockDialer::new();
        dialer.refuse_with("down for maintenance");

        let consumer = consumer_with(dialer, RecordingSink::new());
        let result = consumer.run(Some(99));

        assert!(matches!(result, Err(StreamError::Handshake(_))));
        // Even a failed run reports where to resume from.
        assert_eq!(consumer.cursor(), Some(99));
    }

    #[test]
    fn too_big_frames_advance_cursor_without_dispatch() {
        let dialer = MockDialer::new();
        dialer.push_frame(RawFrame::too_big(20, "acct:alice"));
        dialer.push_frame(frame(21, "after the big one"));

        let sink = RecordingSink::new();
        let consumer = consumer_with(dialer, sink.clone());
        consumer.run(None).unwrap();

        assert_eq!(consumer.cursor(), Some(21));
        let seen = sink.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 21);
    }

    #[test]
    fn cursor_never_decreases() {
        let dialer = MockDialer::new();
        dialer.push_frame(frame(30, "thirty"));
        // A replayed older frame must not move the cursor backwards.
        dialer.push_frame(frame(29, "stale replay"));

        let consumer = consumer_with(dialer, RecordingSink::new());
        consumer.run(None).unwrap();
        assert_eq!(consumer.cursor(), Some(30));
    }

    #[test]
    fn stop_from_another_thread_closes_cleanly() {
        let dialer = MockDialer::new();
        for seq in 0..10_000 {
            dialer.push_frame(frame(seq, "spam"));
        }

        let consumer = Arc::new(consumer_with(dialer, RecordingSink::new()));

        let runner = {
            let consumer = Arc::clone(&consumer);
            std::thread::spawn(move || consumer.run(None))
        };
        consumer.stop();

        let reason = runner.join().unwrap().unwrap();
        // Either the stop landed mid-stream or the script drained first.
        assert!(matches!(
            reason,
            StopReason::Cancelled | StopReason::RemoteClosed
        ));
        if reason == StopReason::Cancelled {
            assert_eq!(consumer.state(), ConsumerState::Closed);
        }
    }

    #[test]
    fn run_twice_reuses_consumer() {
        let dialer = MockDialer::new();
        dialer.push_frame(frame(1, "first run"));

        let consumer = consumer_with(dialer, RecordingSink::new());
        consumer.run(None).unwrap();
        assert_eq!(consumer.cursor(), Some(1));

        // Second run resumes from the recorded cursor.
        let cursor = consumer.cursor();
        consumer.run(cursor).unwrap();
        assert_eq!(consumer.cursor(), Some(1));
    }
}
