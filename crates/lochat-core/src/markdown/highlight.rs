//! Code panels with syntect highlighting

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use super::sanitize::unescape_html;
use super::theme::RenderTheme;

/// Global syntax set - loaded once on first use
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Find a syntax by fence tag (`rust`, `py`, `c++`, ...)
fn find_syntax(lang: &str) -> Option<&'static SyntaxReference> {
    SYNTAX_SET
        .find_syntax_by_token(lang)
        .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang))
}

fn syntect_theme(theme: &RenderTheme) -> Option<&'static Theme> {
    THEME_SET
        .themes
        .get(theme.syntax_theme)
        .or_else(|| THEME_SET.themes.values().next())
}

/// Highlight `code` (literal text) into HTML spans.
///
/// Returns `None` when the language is unknown or syntect fails, in which
/// case the caller shows the plain escaped code.
pub fn highlight_code(code: &str, lang: &str, theme: &RenderTheme) -> Option<String> {
    let syntax = find_syntax(lang)?;
    let mut highlighter = HighlightLines::new(syntax, syntect_theme(theme)?);

    let mut html = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter.highlight_line(line, &SYNTAX_SET).ok()?;
        html.push_str(&styled_line_to_highlighted_html(&ranges, IncludeBackground::No).ok()?);
    }
    Some(html)
}

/// Render a fenced block as a monospace panel.
///
/// `escaped_code` is the block content as stored by the extractor (still
/// HTML-escaped).
pub fn code_panel(lang: Option<&str>, escaped_code: &str, theme: &RenderTheme) -> String {
    let escaped_code = escaped_code.strip_suffix('\n').unwrap_or(escaped_code);

    let body = lang
        .and_then(|l| highlight_code(&unescape_html(escaped_code), l, theme))
        .unwrap_or_else(|| escaped_code.to_string());

    let caption = lang
        .map(|l| {
            format!(
                "<div class=\"code-lang\" style=\"background-color: {}; color: {}; \
                 font-size: 0.8em; padding: 2px 8px; border-radius: 4px 4px 0 0;\">{}</div>",
                theme.code_border_color, theme.dim_color, l
            )
        })
        .unwrap_or_default();

    format!(
        "<div class=\"code-block\" style=\"margin: 8px 0;\">{caption}<pre style=\"background-color: {}; \
         color: {}; border: 1px solid {}; padding: 10px; border-radius: 4px; overflow-x: auto; \
         font-family: 'JetBrains Mono', Consolas, monospace; margin: 0;\"><code>{body}</code></pre></div>",
        theme.code_bg_color, theme.code_fg_color, theme.code_border_color
    )
}
