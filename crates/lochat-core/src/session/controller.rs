//! Streaming session controller
//!
//! Owns the conversation, the in-flight buffer and the display surface.
//! Every chunk is appended to the buffer and the whole buffer is rendered
//! again, so a construct that was cut in half by the network (an unclosed
//! fence, a half-typed `**`) is re-read correctly once the rest arrives.

use thiserror::Error;

use super::events::TurnEvent;
use super::state::{StreamingBuffer, TurnState, TurnTracker};
use super::surface::{DisplaySurface, Frame};
use crate::attachments::Attachment;
use crate::conversation::{History, Message, Role};
use crate::markdown::{render_with_theme, MarkdownCache, RenderTheme};
use crate::ollama::{ChatMessage, StreamEvent};
use crate::transcript;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a reply is still streaming")]
    TurnInProgress,
    #[error("no reply is streaming")]
    NotStreaming,
    #[error("nothing to send")]
    EmptyPrompt,
}

pub struct SessionController<S: DisplaySurface> {
    surface: S,
    theme: RenderTheme,
    history: History,
    buffer: StreamingBuffer,
    state: TurnState,
    tracker: TurnTracker,
    /// Rendered finished messages
    cache: MarkdownCache,
}

impl<S: DisplaySurface> SessionController<S> {
    pub fn new(surface: S, theme: RenderTheme) -> Self {
        Self {
            surface,
            theme,
            history: History::new(),
            buffer: StreamingBuffer::default(),
            state: TurnState::Idle,
            tracker: TurnTracker::new(),
            cache: MarkdownCache::new(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == TurnState::Streaming
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Text received so far in the in-flight turn
    pub fn buffer(&self) -> &str {
        self.buffer.as_str()
    }

    pub fn theme(&self) -> &RenderTheme {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: RenderTheme) {
        self.theme = theme;
        self.cache.check_theme(&self.theme);
    }

    /// Current turn number (0 before the first prompt)
    pub fn turn(&self) -> usize {
        self.tracker.current_turn
    }

    /// Record the user message and start streaming.
    ///
    /// Returns the messages to send with the chat request.
    pub fn begin_turn(
        &mut self,
        prompt: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Vec<ChatMessage>, SessionError> {
        if self.is_streaming() {
            return Err(SessionError::TurnInProgress);
        }
        if prompt.trim().is_empty() && attachments.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        self.history.push(Message::user(prompt, attachments));
        self.buffer.clear();
        self.state = TurnState::Streaming;
        self.tracker.start_turn();

        let messages = self.history.request_messages();
        TurnEvent::TurnStart {
            turn: self.tracker.current_turn,
            message_count: messages.len(),
        }
        .emit();

        self.publish("", None);
        Ok(messages)
    }

    /// Append a chunk and re-render the whole turn
    pub fn push_chunk(&mut self, delta: &str) -> Result<(), SessionError> {
        if !self.is_streaming() {
            return Err(SessionError::NotStreaming);
        }

        self.buffer.push(delta);
        self.tracker.record_chunk();
        TurnEvent::Chunk {
            turn: self.tracker.current_turn,
            bytes: delta.len(),
            total: self.buffer.len(),
        }
        .emit();

        self.publish(delta, None);
        Ok(())
    }

    /// Record the buffer as the assistant reply
    pub fn complete(&mut self) -> Result<(), SessionError> {
        if !self.is_streaming() {
            return Err(SessionError::NotStreaming);
        }

        let reply = self.buffer.take();
        let duration = self.tracker.finish();
        TurnEvent::TurnComplete {
            turn: self.tracker.current_turn,
            duration_ms: duration.as_millis() as u64,
            chunks: self.tracker.chunk_count,
            chars: reply.chars().count(),
        }
        .emit();

        self.history.push(Message::assistant(reply));
        self.state = TurnState::Complete;
        self.publish("", None);
        Ok(())
    }

    /// Discard the partial reply and record `error` instead
    pub fn fail(&mut self, error: &str) -> Result<(), SessionError> {
        if !self.is_streaming() {
            return Err(SessionError::NotStreaming);
        }

        self.buffer.clear();
        self.tracker.finish();
        TurnEvent::TurnFailed {
            turn: self.tracker.current_turn,
            error: error.to_string(),
        }
        .emit();

        self.history.push(Message::error(error));
        self.state = TurnState::Failed;
        self.publish("", Some(error));
        Ok(())
    }

    /// Apply one event from the network task
    pub fn handle_event(&mut self, event: StreamEvent) -> Result<TurnState, SessionError> {
        match event {
            StreamEvent::Chunk { delta } => self.push_chunk(&delta)?,
            StreamEvent::Done => self.complete()?,
            StreamEvent::Failed { error } => self.fail(&error)?,
        }
        Ok(self.state)
    }

    /// Forget the conversation. Not allowed mid-turn.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.is_streaming() {
            return Err(SessionError::TurnInProgress);
        }

        self.history.clear();
        self.buffer.clear();
        self.cache.clear();
        self.state = TurnState::Idle;
        TurnEvent::Cleared.emit();

        self.publish("", None);
        Ok(())
    }

    /// Whole conversation as HTML, in-flight turn included
    pub fn transcript_html(&mut self) -> String {
        let (page, _) = self.render_frame();
        page
    }

    fn render_frame(&mut self) -> (String, String) {
        let mut page = transcript::render_history(&self.history, &self.theme, &mut self.cache);
        let turn_html = if self.is_streaming() {
            let html = render_with_theme(self.buffer.as_str(), &self.theme);
            page.push_str(&transcript::message_html(
                Role::Assistant,
                &html,
                &[],
                &self.theme,
            ));
            html
        } else {
            String::new()
        };
        (page, turn_html)
    }

    fn publish(&mut self, delta: &str, error: Option<&str>) {
        let (page, turn_html) = self.render_frame();
        let frame = Frame {
            transcript: &page,
            turn_html: &turn_html,
            turn_source: self.buffer.as_str(),
            delta,
            state: self.state,
            turn: self.tracker.current_turn,
            error,
        };
        self.surface.publish(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::render;

    #[derive(Debug, Clone, PartialEq)]
    struct Published {
        transcript: String,
        turn_html: String,
        turn_source: String,
        delta: String,
        state: TurnState,
        error: Option<String>,
    }

    #[derive(Default)]
    struct RecordingSurface {
        frames: Vec<Published>,
    }

    impl DisplaySurface for RecordingSurface {
        fn publish(&mut self, frame: &Frame<'_>) {
            self.frames.push(Published {
                transcript: frame.transcript.to_string(),
                turn_html: frame.turn_html.to_string(),
                turn_source: frame.turn_source.to_string(),
                delta: frame.delta.to_string(),
                state: frame.state,
                error: frame.error.map(str::to_string),
            });
        }
    }

    fn controller() -> SessionController<RecordingSurface> {
        SessionController::new(RecordingSurface::default(), RenderTheme::default())
    }

    #[test]
    fn test_full_turn() {
        let mut session = controller();
        let messages = session.begin_turn("hi", vec![]).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(session.state(), TurnState::Streaming);

        session.handle_event(StreamEvent::chunk("Hello ")).unwrap();
        session.handle_event(StreamEvent::chunk("**world**")).unwrap();
        assert_eq!(session.buffer(), "Hello **world**");

        let state = session.handle_event(StreamEvent::Done).unwrap();
        assert_eq!(state, TurnState::Complete);
        assert_eq!(session.buffer(), "");

        let history = session.history().messages();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::assistant("Hello **world**"));

        let frames = &session.surface().frames;
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[2].delta, "**world**");
        assert!(frames[2].turn_html.contains("<strong>world</strong>"));
        assert!(frames[3].transcript.contains("<strong>world</strong>"));
        assert_eq!(frames[3].state, TurnState::Complete);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let reply = "# Title\nSome **bold** and `code`, price $10.\n```rust\nfn main() {}\n```\n- a\n- b\n$$\\frac{1}{2}$$";
        let mut session = controller();
        session.begin_turn("go", vec![]).unwrap();

        for ch in reply.chars() {
            session.push_chunk(&ch.to_string()).unwrap();
        }
        let last = session.surface().frames.last().unwrap();
        assert_eq!(last.turn_source, reply);
        assert_eq!(last.turn_html, render(reply));

        session.complete().unwrap();
        let done = session.surface().frames.last().unwrap();
        assert!(done.transcript.contains(&render(reply)));
    }

    #[test]
    fn test_failure_discards_partial_reply() {
        let mut session = controller();
        session.begin_turn("hi", vec![]).unwrap();
        session.push_chunk("partial answ").unwrap();

        let state = session
            .handle_event(StreamEvent::failed("request timed out"))
            .unwrap();
        assert_eq!(state, TurnState::Failed);

        let history = session.history().messages();
        assert_eq!(history.last().map(|m| m.role), Some(Role::Error));
        assert!(history.iter().all(|m| !m.content.contains("partial")));

        let last = session.surface().frames.last().unwrap();
        assert_eq!(last.error.as_deref(), Some("request timed out"));
        assert!(!last.transcript.contains("partial answ"));

        // The failed prompt is not resent with the next turn
        let messages = session.begin_turn("hi again", vec![]).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi again");
    }

    #[test]
    fn test_state_errors() {
        let mut session = controller();
        assert_eq!(session.push_chunk("x"), Err(SessionError::NotStreaming));
        assert_eq!(session.complete(), Err(SessionError::NotStreaming));
        assert_eq!(session.begin_turn("  ", vec![]), Err(SessionError::EmptyPrompt));

        session.begin_turn("one", vec![]).unwrap();
        assert_eq!(session.begin_turn("two", vec![]), Err(SessionError::TurnInProgress));
        assert_eq!(session.clear(), Err(SessionError::TurnInProgress));
    }

    #[test]
    fn test_clear_after_turn() {
        let mut session = controller();
        session.begin_turn("one", vec![]).unwrap();
        session.complete().unwrap();
        assert_eq!(session.history().len(), 2);

        session.clear().unwrap();
        assert!(session.history().is_empty());
        assert_eq!(session.state(), TurnState::Idle);
        assert_eq!(session.transcript_html(), "");
    }

    #[test]
    fn test_turn_counter() {
        let mut session = controller();
        assert_eq!(session.turn(), 0);
        session.begin_turn("one", vec![]).unwrap();
        session.complete().unwrap();
        session.begin_turn("two", vec![]).unwrap();
        assert_eq!(session.turn(), 2);
    }
}
