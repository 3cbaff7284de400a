//! NDJSON stream processing
//!
//! Ollama streams one JSON object per line. Network chunks can split a line
//! anywhere (including inside a multi-byte character), so partial lines are
//! buffered as bytes until their newline arrives.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::types::ChatChunk;

/// What a complete line of the stream meant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Text fragment of the reply
    Delta(String),
    /// Server signalled the end of the reply
    Done,
    /// Server reported an error object mid-stream
    ServerError(String),
}

/// Turns raw response chunks into [`LineEvent`]s
pub struct NdjsonProcessor {
    /// Bytes of a line whose newline has not arrived yet
    partial_line: Vec<u8>,
    /// When the stream started
    stream_start: Instant,
    /// Complete lines seen
    line_count: usize,
    /// Lines that could not be decoded
    skipped_lines: usize,
    /// Bytes received counter
    bytes_received: usize,
}

impl Default for NdjsonProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl NdjsonProcessor {
    pub fn new() -> Self {
        Self {
            partial_line: Vec::new(),
            stream_start: Instant::now(),
            line_count: 0,
            skipped_lines: 0,
            bytes_received: 0,
        }
    }

    /// Process one chunk of the response body
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Vec<LineEvent> {
        self.bytes_received += bytes.len();
        debug!(
            "NDJSON chunk received: {} bytes (total: {} bytes)",
            bytes.len(),
            self.bytes_received
        );

        let mut events = Vec::new();
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.partial_line.extend_from_slice(&rest[..pos]);
            let line = std::mem::take(&mut self.partial_line);
            self.process_line(&line, &mut events);
            rest = &rest[pos + 1..];
        }
        self.partial_line.extend_from_slice(rest);

        events
    }

    /// Flush a final line that was not newline-terminated
    pub fn finish(&mut self) -> Vec<LineEvent> {
        let mut events = Vec::new();
        if !self.partial_line.is_empty() {
            let line = std::mem::take(&mut self.partial_line);
            self.process_line(&line, &mut events);
        }
        info!(
            "NDJSON stream finished after {:?}: {} lines, {} skipped, {} bytes",
            self.stream_start.elapsed(),
            self.line_count,
            self.skipped_lines,
            self.bytes_received
        );
        events
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    fn process_line(&mut self, line: &[u8], events: &mut Vec<LineEvent>) {
        let Ok(text) = std::str::from_utf8(line) else {
            self.skipped_lines += 1;
            warn!("Skipping non-UTF-8 stream line ({} bytes)", line.len());
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.line_count += 1;

        let chunk: ChatChunk = match serde_json::from_str(text) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.skipped_lines += 1;
                warn!("Skipping malformed stream line #{}: {}", self.line_count, e);
                return;
            }
        };

        if let Some(error) = chunk.error {
            warn!("Server error in stream: {}", error);
            events.push(LineEvent::ServerError(error));
            return;
        }
        if let Some(content) = chunk.content() {
            events.push(LineEvent::Delta(content.to_string()));
        }
        if chunk.done {
            debug!(
                "Stream done marker after {:?}, {} lines",
                self.stream_start.elapsed(),
                self.line_count
            );
            events.push(LineEvent::Done);
        }
    }
}
