//! Streaming chat sessions
//!
//! The controller owns the conversation and the in-flight reply, and
//! publishes a fully re-rendered frame to its display surface after every
//! chunk.

mod controller;
mod events;
mod state;
mod surface;

pub use controller::{SessionController, SessionError};
pub use events::TurnEvent;
pub use state::{StreamingBuffer, TurnState, TurnTracker};
pub use surface::{DisplaySurface, Frame};
