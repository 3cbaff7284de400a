//! Display surfaces for the terminal
//!
//! The terminal gets the raw text as it streams in; the rich transcript is
//! rewritten to an HTML file on every frame.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crossterm::style::{Color, Stylize};
use lochat_core::markdown::RenderTheme;
use lochat_core::session::{DisplaySurface, Frame, TurnState};
use lochat_core::transcript::html_document;
use tracing::warn;

/// `#RRGGBB` -> terminal colour
pub fn hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// Streams deltas to a terminal writer
pub struct TerminalSurface<W: Write> {
    out: W,
    assistant_color: Color,
    error_color: Color,
    /// Last turn whose label was printed
    labelled_turn: usize,
}

impl TerminalSurface<io::Stdout> {
    pub fn stdout(theme: &RenderTheme) -> Self {
        Self::new(io::stdout(), theme)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, theme: &RenderTheme) -> Self {
        Self {
            out,
            assistant_color: hex_color(theme.assistant_msg_color).unwrap_or(Color::Green),
            error_color: hex_color(theme.error_color).unwrap_or(Color::Red),
            labelled_turn: 0,
        }
    }

    fn write_frame(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        match frame.state {
            TurnState::Streaming => {
                if frame.turn != self.labelled_turn {
                    self.labelled_turn = frame.turn;
                    write!(self.out, "{} ", "Assistant:".with(self.assistant_color).bold())?;
                }
                self.out.write_all(frame.delta.as_bytes())?;
            }
            TurnState::Complete => writeln!(self.out)?,
            TurnState::Failed => {
                let error = frame.error.unwrap_or("request failed");
                writeln!(self.out)?;
                writeln!(self.out, "{} {}", "Error:".with(self.error_color).bold(), error)?;
            }
            TurnState::Idle => {}
        }
        self.out.flush()
    }
}

impl<W: Write> DisplaySurface for TerminalSurface<W> {
    fn publish(&mut self, frame: &Frame<'_>) {
        if let Err(e) = self.write_frame(frame) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

/// Rewrites the whole transcript as an HTML page on every frame
pub struct HtmlFileSurface {
    path: PathBuf,
    theme: RenderTheme,
}

impl HtmlFileSurface {
    pub fn new(path: impl Into<PathBuf>, theme: RenderTheme) -> Self {
        Self {
            path: path.into(),
            theme,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySurface for HtmlFileSurface {
    fn publish(&mut self, frame: &Frame<'_>) {
        let page = html_document(frame.transcript, &self.theme);
        if let Err(e) = std::fs::write(&self.path, page) {
            warn!("Failed to write transcript {}: {}", self.path.display(), e);
        }
    }
}

/// Publishes every frame to each inner surface in order
#[derive(Default)]
pub struct FanOut {
    surfaces: Vec<Box<dyn DisplaySurface>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, surface: impl DisplaySurface + 'static) -> Self {
        self.surfaces.push(Box::new(surface));
        self
    }
}

impl DisplaySurface for FanOut {
    fn publish(&mut self, frame: &Frame<'_>) {
        for surface in &mut self.surfaces {
            surface.publish(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lochat_core::session::SessionController;
    use lochat_core::StreamEvent;
    use tempfile::TempDir;

    fn frame<'a>(state: TurnState, turn: usize, delta: &'a str, error: Option<&'a str>) -> Frame<'a> {
        Frame {
            transcript: "",
            turn_html: "",
            turn_source: "",
            delta,
            state,
            turn,
            error,
        }
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#4CAF50"), Some(Color::Rgb { r: 0x4c, g: 0xaf, b: 0x50 }));
        assert_eq!(hex_color("4CAF50"), None);
        assert_eq!(hex_color("#fff"), None);
        assert_eq!(hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_terminal_streams_deltas() {
        let mut buf = Vec::new();
        let mut term = TerminalSurface::new(&mut buf, &RenderTheme::default());
        term.publish(&frame(TurnState::Streaming, 1, "", None));
        term.publish(&frame(TurnState::Streaming, 1, "Hel", None));
        term.publish(&frame(TurnState::Streaming, 1, "lo", None));
        term.publish(&frame(TurnState::Complete, 1, "", None));
        term.publish(&frame(TurnState::Streaming, 2, "", None));
        drop(term);

        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.matches("Assistant:").count(), 2);
        assert!(out.contains("Hello\n"));
    }

    #[test]
    fn test_terminal_reports_failure() {
        let mut buf = Vec::new();
        let mut term = TerminalSurface::new(&mut buf, &RenderTheme::default());
        term.publish(&frame(TurnState::Streaming, 1, "", None));
        term.publish(&frame(TurnState::Failed, 1, "", Some("request timed out")));
        drop(term);

        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("Error:"));
        assert!(out.contains("request timed out"));
    }

    #[test]
    fn test_html_file_rewritten_per_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.html");
        let mut session = SessionController::new(
            HtmlFileSurface::new(&path, RenderTheme::default()),
            RenderTheme::default(),
        );

        session.begin_turn("hi", vec![]).unwrap();
        session.handle_event(StreamEvent::chunk("**bold**")).unwrap();
        let partial = std::fs::read_to_string(&path).unwrap();
        assert!(partial.starts_with("<!DOCTYPE html>"));
        assert!(partial.contains("<strong>bold</strong>"));

        session.handle_event(StreamEvent::Done).unwrap();
        let done = std::fs::read_to_string(&path).unwrap();
        assert!(done.contains("<strong>bold</strong>"));
        assert!(done.contains("You:</b>"));
    }

    #[test]
    fn test_fan_out_reaches_every_surface() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        let mut fan = FanOut::new()
            .with(HtmlFileSurface::new(&a, RenderTheme::default()))
            .with(HtmlFileSurface::new(&b, RenderTheme::default()));

        fan.publish(&Frame {
            transcript: "<p>x</p>",
            ..frame(TurnState::Idle, 0, "", None)
        });
        assert!(std::fs::read_to_string(a).unwrap().contains("<p>x</p>"));
        assert!(std::fs::read_to_string(b).unwrap().contains("<p>x</p>"));
    }
}
