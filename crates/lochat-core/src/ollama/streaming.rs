//! Streaming types for chat replies

use serde::{Deserialize, Serialize};

/// Events sent from the network task to the session controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Text fragment of the reply
    #[serde(rename = "chunk")]
    Chunk { delta: String },

    /// Reply finished normally
    #[serde(rename = "done")]
    Done,

    /// Turn failed; no further events follow
    #[serde(rename = "failed")]
    Failed { error: String },
}

impl StreamEvent {
    pub fn chunk(delta: impl Into<String>) -> Self {
        StreamEvent::Chunk {
            delta: delta.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        StreamEvent::Failed {
            error: error.into(),
        }
    }

    /// True for the event that ends a turn
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk { .. })
    }
}
