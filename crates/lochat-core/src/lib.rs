//! lochat core library
//!
//! Talks to a local Ollama server, accumulates streamed replies and renders
//! them (and the rest of the conversation) as HTML after every chunk.

pub mod attachments;
pub mod config;
pub mod conversation;
pub mod markdown;
pub mod ollama;
pub mod session;
pub mod transcript;

pub use attachments::{Attachment, AttachmentError, AttachmentKind, AttachmentPayload};
pub use config::Config;
pub use conversation::{History, Message, Role};
pub use markdown::{render, render_with_theme, MarkdownCache, RenderTheme};
pub use ollama::{ClientError, OllamaClient, StreamEvent};
pub use session::{DisplaySurface, Frame, SessionController, SessionError, TurnState};
