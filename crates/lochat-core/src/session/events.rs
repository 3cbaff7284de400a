//! Session events
//!
//! Turn lifecycle events, logged via tracing.

use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Prompt sent
    TurnStart { turn: usize, message_count: usize },
    /// Chunk appended to the buffer
    Chunk {
        turn: usize,
        bytes: usize,
        total: usize,
    },
    /// Reply finished and recorded
    TurnComplete {
        turn: usize,
        duration_ms: u64,
        chunks: usize,
        chars: usize,
    },
    /// Turn failed; partial reply discarded
    TurnFailed { turn: usize, error: String },
    /// Conversation cleared
    Cleared,
}

impl TurnEvent {
    /// Emit the event (logged via tracing)
    pub fn emit(&self) {
        match self {
            TurnEvent::Chunk { .. } => debug!("Session event: {:?}", self),
            TurnEvent::TurnFailed { .. } => warn!("Session event: {:?}", self),
            _ => info!("Session event: {:?}", self),
        }
    }
}
