//! Stream transport abstraction.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use skylark_proto::RawFrame;

use crate::error::{StreamError, StreamResult};

/// Opens duplex connections to the event stream.
///
/// This trait abstracts the wire, allowing different implementations
/// (WebSocket in the CLI, scripted mocks in tests).
pub trait StreamDialer: Send + Sync {
    /// Opens a connection, resuming after `resume_cursor` when given.
    fn dial(&self, resume_cursor: Option<u64>) -> StreamResult<Box<dyn StreamConnection>>;
}

/// One live connection to the event stream.
///
/// The consumer is the single reader; blocking reads are acceptable.
pub trait StreamConnection: Send {
    /// Reads the next frame. `Ok(None)` signals a clean close by the
    /// remote.
    fn read_frame(&mut self) -> StreamResult<Option<RawFrame>>;

    /// Closes the connection. Further reads are undefined.
    fn close(&mut self);
}

/// One scripted event a mock connection will replay.
#[derive(Debug, Clone)]
pub enum ScriptedEvent {
    /// Deliver a frame.
    Frame(RawFrame),
    /// Fail the read with a retryable transport error.
    Error(String),
    /// Close the connection cleanly.
    Close,
}

/// A dialer for tests, replaying a scripted event sequence.
#[derive(Default)]
pub struct MockDialer {
    events: Arc<Mutex<VecDeque<ScriptedEvent>>>,
    dials: Mutex<Vec<Option<u64>>>,
    refuse: Mutex<Option<String>>,
}

impl MockDialer {
    /// Creates a dialer with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the script.
    pub fn push(&self, event: ScriptedEvent) {
        self.events.lock().push_back(event);
    }

    /// Appends a frame to the script.
    pub fn push_frame(&self, frame: RawFrame) {
        self.push(ScriptedEvent::Frame(frame));
    }

    /// Makes the next `dial` fail with a handshake error.
    pub fn refuse_with(&self, message: impl Into<String>) {
        *self.refuse.lock() = Some(message.into());
    }

    /// Cursors passed to `dial`, in call order.
    pub fn dial_cursors(&self) -> Vec<Option<u64>> {
        self.dials.lock().clone()
    }
}

impl StreamDialer for MockDialer {
    fn dial(&self, resume_cursor: Option<u64>) -> StreamResult<Box<dyn StreamConnection>> {
        self.dials.lock().push(resume_cursor);

        if let Some(message) = self.refuse.lock().take() {
            return Err(StreamError::Handshake(message));
        }

        Ok(Box::new(MockConnection {
            events: Arc::clone(&self.events),
            closed: false,
        }))
    }
}

/// Connection side of [`MockDialer`].
struct MockConnection {
    events: Arc<Mutex<VecDeque<ScriptedEvent>>>,
    closed: bool,
}

impl StreamConnection for MockConnection {
    fn read_frame(&mut self) -> StreamResult<Option<RawFrame>> {
        if self.closed {
            return Ok(None);
        }
        match self.events.lock().pop_front() {
            Some(ScriptedEvent::Frame(frame)) => Ok(Some(frame)),
            Some(ScriptedEvent::Error(message)) => {
                Err(StreamError::transport_retryable(message))
            }
            Some(ScriptedEvent::Close) | None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
