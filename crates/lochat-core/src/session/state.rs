//! Turn state tracking
//!
//! Tracks the turn lifecycle, turn count and timing, and owns the buffer
//! that accumulates the in-flight reply.

use std::time::{Duration, Instant};

/// Lifecycle of one turn: `Idle -> Streaming -> Complete | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Streaming,
    Complete,
    Failed,
}

/// Runtime counters for the current turn
#[derive(Debug, Default)]
pub struct TurnTracker {
    /// Current turn number (increments each time a prompt is sent)
    pub current_turn: usize,
    /// When the current turn started
    pub turn_start: Option<Instant>,
    /// Chunks received in the current turn
    pub chunk_count: usize,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn
    pub fn start_turn(&mut self) {
        self.current_turn += 1;
        self.turn_start = Some(Instant::now());
        self.chunk_count = 0;
    }

    pub fn record_chunk(&mut self) {
        self.chunk_count += 1;
    }

    /// End the turn, returning its duration
    pub fn finish(&mut self) -> Duration {
        self.turn_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

/// Full text received so far for the in-flight reply
#[derive(Debug, Default)]
pub struct StreamingBuffer {
    text: String,
}

impl StreamingBuffer {
    pub fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Move the text out, leaving the buffer empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}
