//! Server-Sent Events (SSE) and newline-delimited JSON framing.
//!
//! Lines can span multiple TCP packets, and a multi-byte character can be
//! split between two of them, so raw bytes are buffered until a full line is
//! available before anything is decoded.

use std::fmt;
use std::pin::pin;

use futures::{Stream, StreamExt};

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type (from "event:" line)
    pub event: Option<String>,
    /// The event data (from "data:" lines)
    pub data: String,
}

impl SseEvent {
    /// Check if this is a [DONE] marker.
    pub fn is_done(&self) -> bool {
        self.data == "[DONE]"
    }
}

/// Splits a byte stream into complete lines.
#[derive(Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every line completed by them, without terminators.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    /// Return the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.buffer);
        Some(decode_line(&tail))
    }

    pub fn has_buffered_data(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// SSE parser that handles line buffering across TCP packets.
#[derive(Default)]
pub struct SseParser {
    lines: LineBuffer,
    current_event: Option<String>,
    current_data: Vec<String>,
}

impl SseParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and return any complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let lines = self.lines.feed(bytes);
        lines
            .iter()
            .filter_map(|line| self.process_line(line))
            .collect()
    }

    /// Feed a string into the parser.
    pub fn feed_str(&mut self, text: &str) -> Vec<SseEvent> {
        self.feed(text.as_bytes())
    }

    /// Flush at end of stream: a trailing line without terminator and an
    /// event without a closing blank line are both delivered.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let tail = self.lines.finish().and_then(|line| self.process_line(&line));
        tail.or_else(|| self.finalize_event())
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        // Empty line signals end of event
        if line.is_empty() {
            return self.finalize_event();
        }

        // Lines starting with : are comments
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.trim()),
            None => (line, ""),
        };
        match field {
            "event" => self.current_event = Some(value.to_string()),
            "data" => self.current_data.push(value.to_string()),
            _ => {} // Ignore unknown fields
        }
        None
    }

    /// Finalize the current event and reset state.
    fn finalize_event(&mut self) -> Option<SseEvent> {
        let event = self.current_event.take();
        if self.current_data.is_empty() {
            return None;
        }
        let data = self.current_data.join("\n");
        self.current_data.clear();
        if data.is_empty() {
            return None;
        }
        Some(SseEvent { event, data })
    }

    /// Check if there's any buffered data.
    pub fn has_buffered_data(&self) -> bool {
        self.lines.has_buffered_data() || !self.current_data.is_empty()
    }
}

impl fmt::Debug for SseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseParser")
            .field("buffer_len", &self.lines.buffer.len())
            .field("current_data_lines", &self.current_data.len())
            .finish()
    }
}

/// Why a framed stream stopped early.
#[derive(Debug)]
pub enum StreamFault<E> {
    /// The body could not be read
    Read(String),
    /// The handler rejected an event
    Handler(E),
}

/// Drive `body` to its end, calling `on_event` for each SSE event in order.
pub async fn for_each_event<S, B, RE, E, F>(body: S, mut on_event: F) -> Result<(), StreamFault<E>>
where
    S: Stream<Item = Result<B, RE>>,
    B: AsRef<[u8]>,
    RE: fmt::Display,
    F: FnMut(SseEvent) -> Result<(), E>,
{
    let mut body = pin!(body);
    let mut parser = SseParser::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StreamFault::Read(e.to_string()))?;
        for event in parser.feed(chunk.as_ref()) {
            on_event(event).map_err(StreamFault::Handler)?;
        }
    }
    if let Some(event) = parser.finish() {
        on_event(event).map_err(StreamFault::Handler)?;
    }
    Ok(())
}

/// Drive `body` to its end, calling `on_line` for each non-blank line in order.
pub async fn for_each_line<S, B, RE, E, F>(body: S, mut on_line: F) -> Result<(), StreamFault<E>>
where
    S: Stream<Item = Result<B, RE>>,
    B: AsRef<[u8]>,
    RE: fmt::Display,
    F: FnMut(&str) -> Result<(), E>,
{
    let mut body = pin!(body);
    let mut lines = LineBuffer::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StreamFault::Read(e.to_string()))?;
        for line in lines.feed(chunk.as_ref()) {
            if !line.trim().is_empty() {
                on_line(&line).map_err(StreamFault::Handler)?;
            }
        }
    }
    if let Some(line) = lines.finish().filter(|l| !l.trim().is_empty()) {
        on_line(&line).map_err(StreamFault::Handler)?;
    }
    Ok(())
}
