//! Protected block extraction
//!
//! Pulls fenced code, inline code and math out of the (already escaped)
//! text and leaves numbered placeholder tokens behind, so the formatter's
//! substitution rules never see their contents.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::math::MathMode;
use super::sanitize::unescape_html;

/// Literal occurrences of the reserved token prefixes in model output
static RESERVED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__(CODE_BLOCK|CODE_INLINE|MATH_BLOCK|MATH_INLINE)_").unwrap());

/// Closed code fence: ```lang\n ... ```
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```([\w+#.-]*)[^\S\n]*\n(.*?)```").unwrap());

/// Fence opened at a line start and still running at the end of the buffer
static OPEN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^```([\w+#.-]*)[^\S\n]*(?:\n(.*))?\z").unwrap());

static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

static DISPLAY_DOLLARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());

static DISPLAY_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").unwrap());

static INLINE_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\((.+?)\\\)").unwrap());

/// Content lifted out of the text for one render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectedBlock {
    /// Fenced code; `code` is still HTML-escaped
    Code { lang: Option<String>, code: String },
    /// Inline code span; still HTML-escaped
    InlineCode(String),
    /// Formula as literal characters, ready for the math renderer
    Math { formula: String, mode: MathMode },
}

impl ProtectedBlock {
    /// Tag used inside the placeholder token
    pub fn tag(&self) -> &'static str {
        match self {
            ProtectedBlock::Code { .. } => "CODE_BLOCK",
            ProtectedBlock::InlineCode(_) => "CODE_INLINE",
            ProtectedBlock::Math {
                mode: MathMode::Display,
                ..
            } => "MATH_BLOCK",
            ProtectedBlock::Math {
                mode: MathMode::Inline,
                ..
            } => "MATH_INLINE",
        }
    }
}

/// Placeholder table for one render pass
#[derive(Debug, Default)]
pub struct ProtectedBlocks {
    blocks: Vec<ProtectedBlock>,
}

impl ProtectedBlocks {
    /// Store a block and return the token that stands in for it
    fn push(&mut self, block: ProtectedBlock) -> String {
        let token = format!("__{}_{}__", block.tag(), self.blocks.len());
        self.blocks.push(block);
        token
    }

    pub fn get(&self, index: usize) -> Option<&ProtectedBlock> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Replace every protected region of `escaped` with a placeholder.
///
/// Order matters: fences first (they may contain backticks and `$`),
/// then inline code (may contain `$`), then math.
pub fn extract(escaped: &str) -> (String, ProtectedBlocks) {
    let mut blocks = ProtectedBlocks::default();

    let text = RESERVED_PREFIX.replace_all(escaped, "&#95;_${1}_");
    let text = extract_code_fences(&text, &mut blocks);
    let text = extract_inline_code(&text, &mut blocks);
    let text = extract_math(&text, &mut blocks);

    (text, blocks)
}

fn code_block(caps: &Captures<'_>) -> ProtectedBlock {
    let lang = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    let code = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
    ProtectedBlock::Code { lang, code }
}

fn extract_code_fences(text: &str, blocks: &mut ProtectedBlocks) -> String {
    let closed = CODE_FENCE
        .replace_all(text, |caps: &Captures<'_>| blocks.push(code_block(caps)))
        .into_owned();

    // A fence still being streamed swallows the rest of the buffer
    OPEN_FENCE
        .replace(&closed, |caps: &Captures<'_>| blocks.push(code_block(caps)))
        .into_owned()
}

fn extract_inline_code(text: &str, blocks: &mut ProtectedBlocks) -> String {
    INLINE_CODE
        .replace_all(text, |caps: &Captures<'_>| {
            blocks.push(ProtectedBlock::InlineCode(caps[1].to_string()))
        })
        .into_owned()
}

fn math_block(formula: &str, mode: MathMode) -> ProtectedBlock {
    ProtectedBlock::Math {
        formula: unescape_html(formula),
        mode,
    }
}

fn extract_math(text: &str, blocks: &mut ProtectedBlocks) -> String {
    let mut text = text.to_string();

    for (pattern, mode) in [
        (&*DISPLAY_DOLLARS, MathMode::Display),
        (&*DISPLAY_BRACKETS, MathMode::Display),
        (&*INLINE_PARENS, MathMode::Inline),
    ] {
        text = pattern
            .replace_all(&text, |caps: &Captures<'_>| {
                blocks.push(math_block(&caps[1], mode))
            })
            .into_owned();
    }

    extract_dollar_math(&text, blocks)
}

/// Single-dollar inline math.
///
/// The opener must not touch another `$` or a backslash and must be followed
/// by a non-space; the closer must sit on the same line, follow a non-space
/// and not be followed by a digit or another `$`. A span that opens on a
/// digit may not contain whitespace. That keeps amounts like
/// "$10, discount $5" and "paid $5 for it, x$" as plain text.
fn extract_dollar_math(text: &str, blocks: &mut ProtectedBlocks) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && is_dollar_opener(bytes, i) {
            if let Some(close) = find_dollar_closer(bytes, i) {
                out.push_str(&text[last..i]);
                out.push_str(&blocks.push(math_block(&text[i + 1..close], MathMode::Inline)));
                i = close + 1;
                last = i;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&text[last..]);
    out
}

fn is_dollar_opener(bytes: &[u8], i: usize) -> bool {
    let prev = i.checked_sub(1).map(|p| bytes[p]);
    if matches!(prev, Some(b'$') | Some(b'\\')) {
        return false;
    }
    matches!(bytes.get(i + 1), Some(&c) if c != b'$' && !c.is_ascii_whitespace())
}

fn find_dollar_closer(bytes: &[u8], open: usize) -> Option<usize> {
    let mut j = open + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\n' => return None,
            b'$' if bytes[j - 1] == b'\\' => {}
            b'$' => {
                let after = bytes.get(j + 1).copied();
                let span = &bytes[open + 1..j];
                let amount = span.first().is_some_and(u8::is_ascii_digit)
                    && span.iter().any(u8::is_ascii_whitespace);
                let valid = !span.is_empty()
                    && !amount
                    && !bytes[j - 1].is_ascii_whitespace()
                    && !matches!(after, Some(c) if c == b'$' || c.is_ascii_digit());
                return valid.then_some(j);
            }
            _ => {}
        }
        j += 1;
    }
    None
}
