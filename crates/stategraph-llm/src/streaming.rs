use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use tracing::warn;

use stategraph_core::error::{GraphError, Result};

/// Incremental parser for `text/event-stream` bodies.
///
/// Events are separated by a blank line. `data:` lines are joined with `\n`,
/// `event:` sets the type, lines starting with `:` are comments.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
}

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        // A CRLF pair may straddle two chunks, so normalise the whole buffer.
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}

/// Decode as much of `bytes` as possible, leaving an incomplete trailing
/// sequence in place for the next chunk. Invalid sequences become U+FFFD.
fn decode_utf8(bytes: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        let (valid, invalid_len) = match std::str::from_utf8(bytes) {
            Ok(s) => (s.len(), None),
            Err(e) => (e.valid_up_to(), e.error_len()),
        };
        text.push_str(&String::from_utf8_lossy(&bytes[..valid]));

        match invalid_len {
            Some(len) => {
                warn!(bytes = len, "Invalid UTF-8 in SSE stream, replacing");
                text.push(char::REPLACEMENT_CHARACTER);
                bytes.drain(..valid + len);
            }
            None => {
                bytes.drain(..valid);
                return text;
            }
        }
    }
}

/// A stream of SSE events from raw bytes.
///
/// A transport error is yielded once as `LlmStream`, then the stream ends.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    /// Bytes of a UTF-8 sequence split across chunks.
    partial: Vec<u8>,
    failed: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            partial: Vec::new(),
            failed: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.failed {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.partial.extend_from_slice(&bytes);
                    let text = decode_utf8(&mut this.partial);
                    this.pending.extend(this.parser.feed(&text));
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(error = %e, "SSE transport error");
                    this.failed = true;
                    return Poll::Ready(Some(Err(GraphError::LlmStream(e.to_string()))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
