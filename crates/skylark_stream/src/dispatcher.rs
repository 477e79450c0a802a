//! Fan-out of decoded operations to registered sinks.

use skylark_proto::RepoOperation;
use tracing::warn;

use crate::error::SinkError;

/// What one sink did with one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The sink acted on the operation.
    Delivered,
    /// The sink deliberately ignored the operation.
    Filtered,
}

/// Result of handing one operation to one sink.
pub type SinkResult = Result<SinkOutcome, SinkError>;

/// A consumer of dispatched operations.
///
/// Sinks run synchronously on the ingestion path: a slow sink throttles
/// ingestion directly, which is the intended backpressure. A sink that
/// needs real work should hand off to its own worker and return
/// promptly. Because delivery is at-least-once across stream resumes,
/// sinks must tolerate seeing the same (operation, sequence) twice.
pub trait Sink: Send {
    /// Name used in logs when this sink fails.
    fn name(&self) -> &str;

    /// Consumes one operation from the frame with the given sequence
    /// number.
    fn consume(&mut self, operation: &RepoOperation, seq: u64) -> SinkResult;
}

/// Per-dispatch accounting, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Operations a sink acted on.
    pub delivered: usize,
    /// Operations a sink filtered out.
    pub filtered: usize,
    /// Sink invocations that raised.
    pub errors: usize,
}

/// Routes every operation to every registered sink, in registration
/// order, without ever letting a sink failure interrupt the stream.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn Sink>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no sinks.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Registers a sink. Sinks run in registration order.
    pub fn register(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatches a frame's operations, in order, to every sink.
    ///
    /// A sink that raises is logged and skipped for that operation; the
    /// remaining sinks still run and the method always returns.
    pub fn dispatch(&mut self, operations: &[RepoOperation], seq: u64) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for operation in operations {
            for sink in &mut self.sinks {
                match sink.consume(operation, seq) {
                    Ok(SinkOutcome::Delivered) => summary.delivered += 1,
                    Ok(SinkOutcome::Filtered) => summary.filtered += 1,
                    Err(err) => {
                        summary.errors += 1;
                        warn!(
                            sink = sink.name(),
                            seq,
                            path = %operation.path(),
                            error = %err,
                            "sink failed; continuing",
                        );
                    }
                }
            }
        }

        summary
    }
}
