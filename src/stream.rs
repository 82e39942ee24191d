//! Newline-delimited event stream decoding.
//!
//! The search server answers a streaming request with a chunked body in
//! which every event occupies exactly one line:
//!
//! ```text
//! data: {"type":"progress","step":"tokenizing","elapsed":1.2}
//! data: {"type":"progress","step":"scoring","detail":"412 / 9,896 lines","elapsed":3.0}
//! data: {"type":"complete","results":[...],"elapsed_time":4.1}
//! ```
//!
//! [`StreamDecoder`] is the push half: feed it byte chunks as they arrive
//! and it returns the events whose terminating newline has been seen.
//! [`EventStream`] is the pull half: it wraps a [`ChunkSource`] and yields
//! one event at a time.
//!
//! Lines are split on `\n` in the raw bytes before UTF-8 decoding, so a
//! chunk boundary can fall anywhere (mid-line, mid-JSON, mid-character)
//! without changing the decoded sequence. Lines without the `data: ` prefix
//! are keep-alives and are ignored. A `data:` line that does not decode is
//! dropped; only errors from the chunk source itself escalate.

use serde::Deserialize;
use std::collections::VecDeque;

use crate::models::SearchResults;
use crate::transport::{ChunkSource, TransportError};

const DATA_PREFIX: &str = "data: ";

/// One framed event from the search server.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress {
        step: String,
        detail: Option<String>,
        elapsed_seconds: Option<f64>,
    },
    Complete(SearchResults),
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// `Complete` and `Error` end a session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Progress { .. })
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireEvent {
    Progress {
        step: String,
        #[serde(default)]
        detail: Option<String>,
        #[serde(default)]
        elapsed: Option<f64>,
    },
    Complete(SearchResults),
    Error {
        message: String,
    },
}

impl From<WireEvent> for StreamEvent {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::Progress {
                step,
                detail,
                elapsed,
            } => StreamEvent::Progress {
                step,
                detail,
                elapsed_seconds: elapsed,
            },
            WireEvent::Complete(results) => StreamEvent::Complete(results),
            WireEvent::Error { message } => StreamEvent::Error { message },
        }
    }
}

/// Line buffer for one response body. Construct a new one per request.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let line = &self.buffer[consumed..consumed + pos];
            if let Some(event) = parse_line(line) {
                events.push(event);
            }
            consumed += pos + 1;
        }
        self.buffer.drain(..consumed);

        events
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// End of body. An unterminated trailing line is discarded: the server
    /// newline-terminates every event it sends.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                bytes = self.buffer.len(),
                "discarding unterminated trailing line"
            );
            self.buffer.clear();
        }
    }
}

fn parse_line(line: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.strip_suffix('\r').unwrap_or(&text);
    let payload = text.strip_prefix(DATA_PREFIX)?;

    match serde_json::from_str::<WireEvent>(payload) {
        Ok(wire) => Some(wire.into()),
        Err(e) => {
            tracing::debug!(error = %e, "dropping undecodable event line");
            None
        }
    }
}

/// Pull-style event sequence over a response body. Finite and not
/// restartable.
pub struct EventStream {
    source: Box<dyn ChunkSource>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl EventStream {
    pub fn new(source: Box<dyn ChunkSource>) -> Self {
        Self {
            source,
            decoder: StreamDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Next event, `Ok(None)` once the body is exhausted.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, TransportError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }
            match self.source.next_chunk().await {
                Ok(Some(chunk)) => self.pending.extend(self.decoder.feed(&chunk)),
                Ok(None) => {
                    self.decoder.finish();
                    self.done = true;
                }
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
    }
}
