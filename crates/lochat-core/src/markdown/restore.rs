//! Block restoration
//!
//! Swaps every placeholder token for the rendered form of its protected
//! block, in one pass after formatting.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::extract::{ProtectedBlock, ProtectedBlocks};
use super::highlight::code_panel;
use super::math::render_math;
use super::theme::RenderTheme;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"__(?:CODE_BLOCK|CODE_INLINE|MATH_BLOCK|MATH_INLINE)_(\d+)__").unwrap()
});

fn inline_code(escaped: &str, theme: &RenderTheme) -> String {
    format!(
        "<code style=\"background-color: {}; color: {}; padding: 1px 4px; border-radius: 3px; \
         font-family: 'JetBrains Mono', Consolas, monospace;\">{escaped}</code>",
        theme.inline_code_bg_color, theme.inline_code_fg_color
    )
}

fn render_block(block: &ProtectedBlock, theme: &RenderTheme) -> String {
    match block {
        ProtectedBlock::Code { lang, code } => code_panel(lang.as_deref(), code, theme),
        ProtectedBlock::InlineCode(code) => inline_code(code, theme),
        ProtectedBlock::Math { formula, mode } => render_math(formula, *mode, theme),
    }
}

/// Replace placeholders in `formatted` with rendered blocks
pub fn restore(formatted: &str, blocks: &ProtectedBlocks, theme: &RenderTheme) -> String {
    if blocks.is_empty() {
        return formatted.to_string();
    }

    PLACEHOLDER
        .replace_all(formatted, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| blocks.get(index))
                .map(|block| render_block(block, theme))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
