//! Stream command: attach to the live event stream.

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use regex::Regex;
use serde_json::json;
use skylark_proto::RepoOperation;
use skylark_session::value_to_json;
use skylark_stream::{
    AutoReplySink, EventDispatcher, PatternFilterSink, PrintSink, Sink, SinkError, SinkOutcome,
    SinkResult, StreamConsumer,
};

use crate::config::Config;
use crate::ws::WsDialer;

/// Stream command options.
pub struct StreamOpts {
    /// Resume position from a previous run.
    pub cursor: Option<u64>,
    /// Only surface posts whose text matches this pattern.
    pub pattern: Option<String>,
    /// Auto-reply to every surfaced post with this text.
    pub reply: Option<String>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

/// Runs the stream command until the stream ends or ctrl-c.
pub fn run(config: &Config, opts: StreamOpts) -> Result<(), Box<dyn Error>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    if opts.json {
        sinks.push(Box::new(JsonSink::new(std::io::stdout())));
    } else {
        sinks.push(Box::new(PrintSink::new(std::io::stdout())));
    }
    if let Some(reply_text) = &opts.reply {
        let session = super::open_session(config)?;
        sinks.push(Box::new(AutoReplySink::new(session, reply_text.clone())));
    }

    let mut dispatcher = EventDispatcher::new();
    match &opts.pattern {
        Some(pattern) => {
            let mut filter = PatternFilterSink::new(Regex::new(pattern)?);
            for sink in sinks {
                filter = filter.forward_to(sink);
            }
            dispatcher.register(Box::new(filter));
        }
        None => {
            for sink in sinks {
                dispatcher.register(sink);
            }
        }
    }

    let dialer = WsDialer::new(config.stream_url()?);
    let consumer = Arc::new(StreamConsumer::new(dialer, dispatcher));

    {
        let consumer = Arc::clone(&consumer);
        ctrlc::set_handler(move || consumer.stop())?;
    }

    let result = consumer.run(opts.cursor);

    match consumer.cursor() {
        Some(cursor) => eprintln!("stream ended; resume with --cursor {cursor}"),
        None => eprintln!("stream ended before the first frame"),
    }

    result?;
    Ok(())
}

/// Emits every operation as one JSON line.
struct JsonSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonSink<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn consume(&mut self, operation: &RepoOperation, seq: u64) -> SinkResult {
        let line = json!({
            "seq": seq,
            "action": operation.kind.as_str(),
            "account": operation.account,
            "path": operation.path(),
            "hash": operation.hash.map(|hash| hash.to_hex()),
            "record": operation
                .record
                .as_ref()
                .map(|record| value_to_json(&record.to_value())),
        });

        writeln!(self.writer, "{line}").map_err(|err| SinkError::new(err.to_string()))?;
        Ok(SinkOutcome::Delivered)
    }
}
