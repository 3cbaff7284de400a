//! Inline/block formatting rules
//!
//! An ordered list of regex substitutions applied to escaped,
//! placeholder-bearing text. Protected content is already out of the way,
//! so nothing here needs to know about code or math.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::theme::RenderTheme;

static BOLD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*\*(.+?)\*\*\*").unwrap());

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

/// Opener and closer must both hug non-space text, so `2 * 3 * 4` and
/// `* item` stay literal
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*?[^*\s])?)\*").unwrap());

/// http(s) targets only; quotes, whitespace and `<` end the URL
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[([^\]\n]+)\]\((https?://[^\s)"'<]+)\)"#).unwrap());

/// Placeholder tokens restored later; never valid inside a URL
static TOKEN_IN_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(?:CODE|MATH)_").unwrap());

static RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*---[ \t]*$").unwrap());

/// h4 first so `####` is never read as `#` + text
static HEADINGS: Lazy<[(usize, Regex); 4]> = Lazy::new(|| {
    [4, 3, 2, 1].map(|level| {
        let pattern = format!(r"(?m)^{} (.+)$", "#".repeat(level));
        (level, Regex::new(&pattern).unwrap())
    })
});

static BULLET_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*] (.+)$").unwrap());

static ORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\d+)\. (.+)$").unwrap());

static BULLET_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^<li>.*</li>(?:\n<li>.*</li>)*").unwrap());

static ORDERED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^<li value="\d+">.*</li>(?:\n<li value="\d+">.*</li>)*"#).unwrap()
});

/// Breaks that would double the spacing after a block element
static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(</h[1-4]>|</li>|</ul>|</ol>|<hr[^>]*>|__CODE_BLOCK_\d+__|__MATH_BLOCK_\d+__)<br>")
        .unwrap()
});

const HEADING_SIZES: [&str; 4] = ["1.6em", "1.4em", "1.2em", "1.1em"];
const HEADING_WEIGHTS: [u16; 4] = [700, 700, 600, 600];

/// Apply the formatting rules in order.
///
/// Inline code needs no rule of its own: its spans were lifted into
/// placeholders by the extractor and are rendered by the restorer.
pub fn format_text(text: &str, theme: &RenderTheme) -> String {
    let text = BOLD_ITALIC.replace_all(text, "<strong><em>${1}</em></strong>");
    let text = BOLD.replace_all(&text, "<strong>${1}</strong>");
    let text = ITALIC.replace_all(&text, "<em>${1}</em>");

    let text = LINK.replace_all(&text, |caps: &Captures<'_>| {
        let url = &caps[2];
        if TOKEN_IN_URL.is_match(url) {
            return caps[0].to_string();
        }
        format!(
            "<a href=\"{url}\" style=\"color: {}; text-decoration: underline;\">{}</a>",
            theme.link_color, &caps[1]
        )
    });

    let rule = format!(
        "<hr style=\"border: none; border-top: 1px solid {}; margin: 8px 0;\">",
        theme.rule_color
    );
    let mut text = RULE.replace_all(&text, rule.as_str()).into_owned();

    for (level, pattern) in HEADINGS.iter() {
        let idx = level - 1;
        let heading = format!(
            "<h{level} style=\"color: {}; font-size: {}; font-weight: {}; margin: 8px 0 4px 0;\">${{1}}</h{level}>",
            theme.heading_color(*level),
            HEADING_SIZES[idx],
            HEADING_WEIGHTS[idx]
        );
        text = pattern.replace_all(&text, heading.as_str()).into_owned();
    }

    let text = BULLET_ITEM.replace_all(&text, "<li>${1}</li>");
    let text = ORDERED_ITEM.replace_all(&text, "<li value=\"${1}\">${2}</li>");
    let text = BULLET_RUN.replace_all(
        &text,
        "<ul style=\"margin: 4px 0; padding-left: 24px;\">${0}</ul>",
    );
    let text = ORDERED_RUN.replace_all(
        &text,
        "<ol style=\"margin: 4px 0; padding-left: 24px;\">${0}</ol>",
    );

    let text = text.replace('\n', "<br>");
    BLOCK_BREAK.replace_all(&text, "${1}").into_owned()
}
