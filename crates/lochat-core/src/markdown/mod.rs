//! Markdown rendering for chat messages
//!
//! A small, fixed markdown grammar rendered to HTML in four stages:
//! escape, extract protected blocks, apply formatting rules, restore the
//! blocks. `render` is a pure function of its input, so a streamed reply is
//! simply re-rendered in full after every chunk.

mod cache;
mod extract;
mod format;
mod highlight;
mod math;
mod restore;
mod sanitize;
pub mod theme;

pub use cache::MarkdownCache;
pub use extract::{ProtectedBlock, ProtectedBlocks};
pub use math::{render_math, to_unicode, MathError, MathMode};
pub use sanitize::{escape_html, unescape_html};
pub use theme::RenderTheme;

use once_cell::sync::Lazy;

static DEFAULT_THEME: Lazy<RenderTheme> = Lazy::new(RenderTheme::default);

/// Render markdown to HTML with the default theme
pub fn render(text: &str) -> String {
    render_with_theme(text, &DEFAULT_THEME)
}

/// Render markdown to HTML
pub fn render_with_theme(text: &str, theme: &RenderTheme) -> String {
    let escaped = sanitize::escape_html(text);
    let (body, blocks) = extract::extract(&escaped);
    let formatted = format::format_text(&body, theme);
    restore::restore(&formatted, &blocks, theme)
}
