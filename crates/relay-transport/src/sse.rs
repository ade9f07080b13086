//! Chunk-tolerant reassembly of Server-Sent Events.
//!
//! Transport chunking carries no meaning: a frame may arrive split at any
//! byte position, including inside a UTF-8 sequence, and a chunk may carry
//! many frames. [`Reassembler`] buffers raw bytes, splits on `\n`, and only
//! decodes complete lines, so every chunking of the same input yields the
//! same event sequence.

use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use metrics::counter;
use serde_json::Value;

use relay_core::errors::TransportError;

/// Payload of a framed event's `data` field.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Data that parsed as JSON.
    Json(Value),
    /// Data that did not parse as JSON (heartbeats, free text).
    Text(String),
}

/// One reassembled wire event.
///
/// Emitted only for blocks that carried a `data` field; blocks without data
/// (comments, stray `id`/`event` lines) are dropped at the closing blank
/// line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramedEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub retry: Option<u64>,
    pub data: Option<Payload>,
}

/// Streaming line reassembler for the SSE wire format.
///
/// `&mut self` throughout: one reassembler per stream, fed in arrival order.
/// There are no await points inside [`push`](Self::push); all intra-chunk
/// processing is synchronous.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: BytesMut,
    id: Option<String>,
    event: Option<String>,
    retry: Option<u64>,
    data_lines: Vec<String>,
    bare_data: bool,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FramedEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line_bytes = self.buffer.split_to(newline_pos + 1);
            line_bytes.truncate(line_bytes.len() - 1);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.truncate(line_bytes.len() - 1);
            }

            // Partially-received multi-byte sequences never get here: they
            // sit in the buffer until their line terminator arrives.
            let Ok(line) = std::str::from_utf8(&line_bytes) else {
                continue;
            };

            if line.is_empty() {
                if let Some(event) = self.close_block() {
                    out.push(event);
                }
            } else {
                self.consume_line(line);
            }
        }

        out
    }

    /// Flush at end of stream: treat the buffered partial line as terminated,
    /// then close any open block. Never panics, never errors.
    pub fn finish(&mut self) -> Vec<FramedEvent> {
        let mut out = Vec::new();

        let mut tail = std::mem::take(&mut self.buffer);
        if tail.last() == Some(&b'\r') {
            tail.truncate(tail.len() - 1);
        }
        if let Ok(line) = std::str::from_utf8(&tail) {
            if !line.is_empty() {
                self.consume_line(line);
            }
        }

        if let Some(event) = self.close_block() {
            out.push(event);
        }
        out
    }

    fn consume_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let raw = &line[idx + 1..];
                (&line[..idx], Some(raw.strip_prefix(' ').unwrap_or(raw)))
            }
            // A field name alone marks presence without a value.
            None => (line, None),
        };

        match (field, value) {
            ("data", Some(v)) => self.data_lines.push(v.to_owned()),
            ("data", None) => self.bare_data = true,
            ("id", v) => self.id = Some(v.unwrap_or("").to_owned()),
            ("event", v) => self.event = Some(v.unwrap_or("").to_owned()),
            ("retry", Some(v)) => {
                if let Ok(ms) = v.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            // A bare retry marker is not a number; nothing to record.
            ("retry", None) => {}
            _ => {}
        }
    }

    /// Close the in-progress block: emit iff it carried data, always reset.
    fn close_block(&mut self) -> Option<FramedEvent> {
        let id = self.id.take();
        let event = self.event.take();
        let retry = self.retry.take();
        let data_lines = std::mem::take(&mut self.data_lines);
        let bare_data = std::mem::take(&mut self.bare_data);

        let data = if data_lines.is_empty() {
            if bare_data {
                Some(Payload::Json(Value::Bool(true)))
            } else {
                return None;
            }
        } else {
            let joined = data_lines.join("\n");
            Some(match serde_json::from_str::<Value>(&joined) {
                Ok(value) => Payload::Json(value),
                Err(_) => Payload::Text(joined),
            })
        };

        counter!("relay_sse_events_total").increment(1);
        Some(FramedEvent { id, event, retry, data })
    }
}

/// Adapt a fallible byte stream into a lazy ordered stream of framed events.
///
/// On a source error the reassembler is flushed first (a truncated final
/// event beats a dropped one), then the error surfaces and the stream
/// terminates. The source is released on every exit path.
pub fn framed_events<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<FramedEvent, TransportError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    try_stream! {
        let mut reassembler = Reassembler::new();
        let mut byte_stream = Box::pin(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in reassembler.push(&bytes) {
                        yield event;
                    }
                }
                Err(e) => {
                    for event in reassembler.finish() {
                        yield event;
                    }
                    Err(TransportError::Stream(e.to_string()))?;
                }
            }
        }
        for event in reassembler.finish() {
            yield event;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
