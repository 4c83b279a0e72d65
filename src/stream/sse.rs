//! Upstream SSE decoding: bytes to raw chunk values.
//!
//! Handles buffering of partial lines and UTF-8 sequences split across
//! network reads, and the field rules of the
//! [SSE specification](https://html.spec.whatwg.org/multipage/server-sent-events.html).

use futures_util::{Stream, StreamExt};
use memchr::memchr_iter;
use serde_json::Value;

use crate::util::extract_sse_data_payload;

/// A parsed SSE event from the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Whether this is the terminal `[DONE]` sentinel.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    /// Decode the `data` payload into a raw chunk.
    ///
    /// Returns `None` for empty payloads and `[DONE]`. A payload that is not
    /// valid JSON is kept as a JSON string so the dispatcher can report it.
    #[must_use]
    pub fn into_chunk(self) -> Option<Value> {
        let payload = extract_sse_data_payload(&self.data)?;
        Some(match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!("upstream SSE data is not JSON: {err}");
                Value::String(payload.to_owned())
            }
        })
    }
}

/// Incremental SSE line parser.
///
/// Feed it raw text chunks (arriving at arbitrary boundaries) and it yields
/// fully-assembled [`SseEvent`]s.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    read_offset: usize,
    event_type: Option<String>,
    data_buffer: String,
    has_data: bool,
    last_event_id: Option<String>,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text and return any complete events parsed.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete events into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseEvent>) {
        self.buffer.push_str(chunk);
        let scan_start = self.read_offset;
        let mut processed_up_to = scan_start;
        let line_ends: Vec<usize> = memchr_iter(b'\n', &self.buffer.as_bytes()[scan_start..])
            .map(|rel| scan_start + rel)
            .collect();
        for line_end in line_ends {
            let line = self.buffer[processed_up_to..line_end].to_owned();
            self.process_line(line.strip_suffix('\r').unwrap_or(&line), out);
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.read_offset < self.buffer.len() {
            let line = self.buffer[self.read_offset..].to_owned();
            let mut out = Vec::new();
            self.process_line(line.strip_suffix('\r').unwrap_or(&line), &mut out);
            self.buffer.clear();
            self.read_offset = 0;
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            events.extend(self.take_event());
            return;
        }
        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("data:") {
            // Exactly one leading space is part of the field separator.
            let value = value.strip_prefix(' ').unwrap_or(value);
            if self.has_data {
                self.data_buffer.push('\n');
            } else {
                self.has_data = true;
            }
            self.data_buffer.push_str(value);
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.event_type = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.last_event_id = Some(value.to_string());
        }
        // `retry:` and unknown fields are ignored
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.event_type = None;
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event: self.event_type.take(),
            data: std::mem::take(&mut self.data_buffer),
            id: self.last_event_id.clone(),
        })
    }
}

/// Split an upstream byte stream into SSE events.
///
/// Transport errors are logged and skipped; closing the connection is the
/// transport's job.
pub fn sse_event_stream<S, E>(byte_stream: S) -> impl Stream<Item = SseEvent> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        DecodeState {
            stream: Box::pin(byte_stream),
            parser: SseParser::new(),
            remainder: Vec::new(),
            pending: std::collections::VecDeque::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((event, state));
                }
                if state.finished {
                    return None;
                }
                match state.stream.as_mut().next().await {
                    Some(Ok(bytes)) => state.feed_bytes(&bytes),
                    Some(Err(err)) => tracing::debug!("upstream byte stream error: {err}"),
                    None => {
                        state.finished = true;
                        state.flush_remainder();
                        state.pending.extend(state.parser.finish());
                    }
                }
            }
        },
    )
}

/// Decode an upstream SSE byte stream into raw chunk values.
///
/// `[DONE]` and empty data events are dropped.
pub fn chunk_stream<S, E>(byte_stream: S) -> impl Stream<Item = Value> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    sse_event_stream(byte_stream)
        .filter_map(|event| futures_util::future::ready(event.into_chunk()))
}

struct DecodeState<S> {
    stream: std::pin::Pin<Box<S>>,
    parser: SseParser,
    remainder: Vec<u8>,
    pending: std::collections::VecDeque<SseEvent>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn feed_bytes(&mut self, bytes: &[u8]) {
        self.remainder.extend_from_slice(bytes);
        let mut parsed = Vec::new();
        loop {
            // An incomplete trailing sequence waits for the next read; invalid
            // bytes are replaced.
            let consumed = match std::str::from_utf8(&self.remainder) {
                Ok(_) => self.remainder.len(),
                Err(err) => err.valid_up_to() + err.error_len().unwrap_or(0),
            };
            if consumed == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&self.remainder[..consumed]);
            self.parser.feed_into(&text, &mut parsed);
            self.remainder.drain(..consumed);
        }
        self.pending.extend(parsed);
    }

    /// Push bytes of an unfinished UTF-8 sequence through as U+FFFD.
    fn flush_remainder(&mut self) {
        if self.remainder.is_empty() {
            return;
        }
        tracing::debug!(
            bytes = self.remainder.len(),
            "upstream stream ended inside a UTF-8 sequence"
        );
        let text = String::from_utf8_lossy(&self.remainder);
        let mut parsed = Vec::new();
        self.parser.feed_into(&text, &mut parsed);
        self.pending.extend(parsed);
        self.remainder.clear();
    }
}
