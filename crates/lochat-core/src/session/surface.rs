use super::state::TurnState;

/// One publication to a display surface
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Whole conversation as HTML, in-flight turn included
    pub transcript: &'a str,
    /// Rendered in-flight turn (empty outside a turn)
    pub turn_html: &'a str,
    /// Raw text of the in-flight turn
    pub turn_source: &'a str,
    /// Text appended since the previous frame
    pub delta: &'a str,
    pub state: TurnState,
    pub turn: usize,
    /// Set when the turn just failed
    pub error: Option<&'a str>,
}

/// Somewhere rendered frames are shown
pub trait DisplaySurface {
    /// Replace what is shown with `frame`
    fn publish(&mut self, frame: &Frame<'_>);
}

impl<S: DisplaySurface + ?Sized> DisplaySurface for Box<S> {
    fn publish(&mut self, frame: &Frame<'_>) {
        (**self).publish(frame)
    }
}
