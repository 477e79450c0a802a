//! # Skylark Stream
//!
//! Repository event-stream consumption for skylark.
//!
//! This crate provides:
//! - `StreamConsumer`, the read→decode→dispatch loop with cursor/resume
//!   state
//! - `EventDispatcher` and the `Sink` trait
//! - Built-in sinks: printing, pattern filtering, auto-reply
//! - The `StreamDialer`/`StreamConnection` transport abstraction
//!
//! ## Delivery semantics
//!
//! The consumer advances its cursor only after a frame's dispatch
//! returns, so resuming from the reported cursor is at-least-once:
//! the frame in flight at a crash is redelivered. Sinks are expected to
//! be idempotent. Corrupt frames are skipped (cursor still advances);
//! a failing sink is logged and never stalls ingestion.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod dispatcher;
mod error;
mod sink;
mod transport;

pub use consumer::{ConsumerState, StopReason, StreamConsumer};
pub use dispatcher::{DispatchSummary, EventDispatcher, Sink, SinkOutcome, SinkResult};
pub use error::{SinkError, StreamError, StreamResult};
pub use sink::{AutoReplySink, PatternFilterSink, PrintSink, RecordingSink};
pub use transport::{MockDialer, ScriptedEvent, StreamConnection, StreamDialer};
