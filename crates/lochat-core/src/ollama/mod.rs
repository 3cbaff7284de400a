//! Ollama model-server client
//!
//! Model listing, streaming and non-streaming chat. The streaming call runs
//! on its own task and reports back through [`StreamEvent`]s.

mod client;
mod error;
mod ndjson;
mod streaming;
mod types;

pub use client::{OllamaClient, DEFAULT_HOST, DEFAULT_LIST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, ClientResult};
pub use ndjson::{LineEvent, NdjsonProcessor};
pub use streaming::StreamEvent;
pub use types::{ChatChunk, ChatMessage, ChatRequest, ModelTag, TagsResponse};
