//! Math rendering
//!
//! Converts a LaTeX formula into a Unicode approximation (Greek letters,
//! operators, super/subscripts, vulgar fractions) and wraps it in inline or
//! display markup. Anything the converter cannot express falls back to the
//! raw formula shown as warning-coloured code, so rendering never fails.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use super::sanitize::escape_html;
use super::theme::RenderTheme;

/// Inline (`$...$`, `\(...\)`) or display (`$$...$$`, `\[...\]`) math
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathMode {
    Inline,
    Display,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("empty formula")]
    Empty,
    #[error("unbalanced braces")]
    UnbalancedBraces,
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),
    #[error("unknown command: \\{0}")]
    UnknownCommand(String),
}

// Private-use stand-ins for escaped characters that must survive the
// structural passes as literals
const LBRACE: char = '\u{E000}';
const RBRACE: char = '\u{E001}';
const UNDERSCORE: char = '\u{E002}';
const CARET: char = '\u{E003}';

static ENVIRONMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\begin\s*\{([^}]*)\}").unwrap());

static COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());

static SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        // Greek, lowercase
        ("alpha", "α"),
        ("beta", "β"),
        ("gamma", "γ"),
        ("delta", "δ"),
        ("epsilon", "ϵ"),
        ("varepsilon", "ε"),
        ("zeta", "ζ"),
        ("eta", "η"),
        ("theta", "θ"),
        ("vartheta", "ϑ"),
        ("iota", "ι"),
        ("kappa", "κ"),
        ("lambda", "λ"),
        ("mu", "μ"),
        ("nu", "ν"),
        ("xi", "ξ"),
        ("omicron", "ο"),
        ("pi", "π"),
        ("varpi", "ϖ"),
        ("rho", "ρ"),
        ("varrho", "ϱ"),
        ("sigma", "σ"),
        ("varsigma", "ς"),
        ("tau", "τ"),
        ("upsilon", "υ"),
        ("phi", "ϕ"),
        ("varphi", "φ"),
        ("chi", "χ"),
        ("psi", "ψ"),
        ("omega", "ω"),
        // Greek, uppercase
        ("Gamma", "Γ"),
        ("Delta", "Δ"),
        ("Theta", "Θ"),
        ("Lambda", "Λ"),
        ("Xi", "Ξ"),
        ("Pi", "Π"),
        ("Sigma", "Σ"),
        ("Upsilon", "Υ"),
        ("Phi", "Φ"),
        ("Psi", "Ψ"),
        ("Omega", "Ω"),
        // Binary operators
        ("cdot", "·"),
        ("times", "×"),
        ("div", "÷"),
        ("pm", "±"),
        ("mp", "∓"),
        ("ast", "∗"),
        ("star", "⋆"),
        ("circ", "∘"),
        ("bullet", "•"),
        ("oplus", "⊕"),
        ("ominus", "⊖"),
        ("otimes", "⊗"),
        ("odot", "⊙"),
        ("cup", "∪"),
        ("cap", "∩"),
        ("setminus", "∖"),
        ("wedge", "∧"),
        ("vee", "∨"),
        ("land", "∧"),
        ("lor", "∨"),
        // Relations
        ("neq", "≠"),
        ("ne", "≠"),
        ("approx", "≈"),
        ("equiv", "≡"),
        ("cong", "≅"),
        ("sim", "∼"),
        ("simeq", "≃"),
        ("propto", "∝"),
        ("leq", "≤"),
        ("le", "≤"),
        ("geq", "≥"),
        ("ge", "≥"),
        ("ll", "≪"),
        ("gg", "≫"),
        ("subset", "⊂"),
        ("supset", "⊃"),
        ("subseteq", "⊆"),
        ("supseteq", "⊇"),
        ("in", "∈"),
        ("notin", "∉"),
        ("ni", "∋"),
        ("perp", "⊥"),
        ("parallel", "∥"),
        ("mid", "∣"),
        // Arrows
        ("to", "→"),
        ("rightarrow", "→"),
        ("leftarrow", "←"),
        ("gets", "←"),
        ("leftrightarrow", "↔"),
        ("Rightarrow", "⇒"),
        ("Leftarrow", "⇐"),
        ("Leftrightarrow", "⇔"),
        ("implies", "⟹"),
        ("iff", "⟺"),
        ("mapsto", "↦"),
        ("uparrow", "↑"),
        ("downarrow", "↓"),
        ("longrightarrow", "⟶"),
        // Logic and sets
        ("forall", "∀"),
        ("exists", "∃"),
        ("nexists", "∄"),
        ("neg", "¬"),
        ("lnot", "¬"),
        ("emptyset", "∅"),
        ("varnothing", "∅"),
        // Big operators
        ("sum", "∑"),
        ("prod", "∏"),
        ("coprod", "∐"),
        ("int", "∫"),
        ("iint", "∬"),
        ("iiint", "∭"),
        ("oint", "∮"),
        ("bigcup", "⋃"),
        ("bigcap", "⋂"),
        // Misc symbols
        ("infty", "∞"),
        ("partial", "∂"),
        ("nabla", "∇"),
        ("hbar", "ℏ"),
        ("ell", "ℓ"),
        ("Re", "ℜ"),
        ("Im", "ℑ"),
        ("wp", "℘"),
        ("aleph", "ℵ"),
        ("angle", "∠"),
        ("triangle", "△"),
        ("square", "□"),
        ("diamond", "◇"),
        ("prime", "′"),
        ("degree", "°"),
        ("sqrt", "√"),
        ("ldots", "…"),
        ("dots", "…"),
        ("cdots", "⋯"),
        ("vdots", "⋮"),
        ("ddots", "⋱"),
        ("langle", "⟨"),
        ("rangle", "⟩"),
        ("lfloor", "⌊"),
        ("rfloor", "⌋"),
        ("lceil", "⌈"),
        ("rceil", "⌉"),
        // Function names print upright
        ("sin", "sin"),
        ("cos", "cos"),
        ("tan", "tan"),
        ("cot", "cot"),
        ("sec", "sec"),
        ("csc", "csc"),
        ("arcsin", "arcsin"),
        ("arccos", "arccos"),
        ("arctan", "arctan"),
        ("sinh", "sinh"),
        ("cosh", "cosh"),
        ("tanh", "tanh"),
        ("log", "log"),
        ("ln", "ln"),
        ("exp", "exp"),
        ("lim", "lim"),
        ("max", "max"),
        ("min", "min"),
        ("sup", "sup"),
        ("inf", "inf"),
        ("det", "det"),
        ("gcd", "gcd"),
        ("arg", "arg"),
        ("deg", "deg"),
        ("dim", "dim"),
        ("ker", "ker"),
        ("mod", "mod"),
        ("bmod", "mod"),
        // Layout commands with no Unicode counterpart
        ("left", ""),
        ("right", ""),
        ("big", ""),
        ("Big", ""),
        ("bigg", ""),
        ("Bigg", ""),
        ("displaystyle", ""),
        ("textstyle", ""),
        ("limits", ""),
        ("nolimits", ""),
        ("quad", "  "),
        ("qquad", "    "),
    ]
    .into_iter()
    .collect()
});

const VULGAR_FRACTIONS: &[(&str, &str, &str)] = &[
    ("1", "2", "½"),
    ("1", "3", "⅓"),
    ("2", "3", "⅔"),
    ("1", "4", "¼"),
    ("3", "4", "¾"),
    ("1", "5", "⅕"),
    ("2", "5", "⅖"),
    ("3", "5", "⅗"),
    ("4", "5", "⅘"),
    ("1", "6", "⅙"),
    ("5", "6", "⅚"),
    ("1", "7", "⅐"),
    ("1", "8", "⅛"),
    ("3", "8", "⅜"),
    ("5", "8", "⅝"),
    ("7", "8", "⅞"),
    ("1", "9", "⅑"),
    ("1", "10", "⅒"),
];

/// Render a formula. Never fails: unconvertible input falls back to the raw
/// formula in a warning-coloured code span.
pub fn render_math(formula: &str, mode: MathMode, theme: &RenderTheme) -> String {
    match to_unicode(formula) {
        Ok(text) => wrap(&escape_html(&text), mode, theme),
        Err(err) => {
            debug!(error = %err, ?mode, "math fallback");
            fallback(formula, &err, theme)
        }
    }
}

fn wrap(text: &str, mode: MathMode, theme: &RenderTheme) -> String {
    const FONT: &str = "'Cambria Math', 'STIX Two Math', 'Latin Modern Math', serif";
    match mode {
        MathMode::Inline => format!(
            "<span class=\"math-inline\" style=\"font-family: {FONT}; color: {}; \
             vertical-align: middle; font-size: 0.95em;\">{text}</span>",
            theme.math_color
        ),
        MathMode::Display => format!(
            "<div class=\"math-display\" style=\"text-align: center; margin: 8px 0; \
             font-family: {FONT}; color: {}; font-size: 1.1em;\">{text}</div>",
            theme.math_color
        ),
    }
}

fn fallback(formula: &str, err: &MathError, theme: &RenderTheme) -> String {
    let title = escape_html(&err.to_string()).replace('"', "&quot;");
    format!(
        "<code class=\"math-error\" title=\"{title}\" style=\"background-color: {}; color: {}; \
         padding: 2px 4px; border-radius: 3px; font-family: monospace;\">{}</code>",
        theme.inline_code_bg_color,
        theme.warning_color,
        escape_html(formula)
    )
}

/// Convert a LaTeX formula into plain Unicode text
pub fn to_unicode(formula: &str) -> Result<String, MathError> {
    if formula.trim().is_empty() {
        return Err(MathError::Empty);
    }
    if let Some(caps) = ENVIRONMENT.captures(formula) {
        return Err(MathError::UnsupportedEnvironment(caps[1].trim().to_string()));
    }

    let text = protect_escapes(formula);
    check_braces(&text)?;

    let text = apply_wrappers(&text);
    let text = replace_fractions(&text);
    let text = replace_roots(&text);
    let text = replace_symbols(&text)?;
    let text = apply_scripts(&text);

    let text: String = text
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .map(|c| match c {
            LBRACE => '{',
            RBRACE => '}',
            UNDERSCORE => '_',
            CARET => '^',
            other => other,
        })
        .collect();

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(MathError::Empty);
    }
    Ok(text)
}

fn protect_escapes(formula: &str) -> String {
    formula
        .replace(r"\\", " ")
        .replace(r"\{", &LBRACE.to_string())
        .replace(r"\}", &RBRACE.to_string())
        .replace(r"\_", &UNDERSCORE.to_string())
        .replace(r"\^", &CARET.to_string())
        .replace(r"\|", "‖")
        .replace(r"\%", "%")
        .replace(r"\$", "$")
        .replace(r"\&", "&")
        .replace(r"\#", "#")
        .replace(r"\,", " ")
        .replace(r"\;", " ")
        .replace(r"\:", " ")
        .replace(r"\ ", " ")
        .replace(r"\!", "")
}

fn check_braces(text: &str) -> Result<(), MathError> {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.checked_sub(1).ok_or(MathError::UnbalancedBraces)?,
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(MathError::UnbalancedBraces)
    }
}

/// Find the byte offset of the brace closing an already-opened group
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 1;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Replace every `\cmd{arg}` with `f(arg)`
fn replace_command(text: &str, cmd: &str, f: impl Fn(&str) -> String) -> String {
    let open = format!("\\{cmd}{{");
    let mut result = text.to_string();
    let mut from = 0;

    while let Some(pos) = result[from..].find(&open) {
        let start = from + pos;
        let arg_start = start + open.len();
        let Some(len) = find_matching_brace(&result[arg_start..]) else {
            break;
        };
        let replacement = f(&result[arg_start..arg_start + len]);
        result.replace_range(start..arg_start + len + 1, &replacement);
        from = start;
    }
    result
}

fn apply_wrappers(text: &str) -> String {
    let literal = |arg: &str| arg.replace('_', &UNDERSCORE.to_string());
    let mut text = text.to_string();

    for cmd in ["text", "textrm", "textit", "textbf", "mathrm", "operatorname"] {
        text = replace_command(&text, cmd, literal);
    }
    for cmd in ["mathbf", "mathit", "boldsymbol", "mathsf", "mathcal"] {
        text = replace_command(&text, cmd, str::to_string);
    }

    text = replace_command(&text, "mathbb", |arg| {
        arg.chars()
            .map(|c| match c {
                'R' => 'ℝ',
                'N' => 'ℕ',
                'Z' => 'ℤ',
                'Q' => 'ℚ',
                'C' => 'ℂ',
                'P' => 'ℙ',
                'H' => 'ℍ',
                other => other,
            })
            .collect()
    });

    for (cmd, mark) in [
        ("hat", '\u{0302}'),
        ("widehat", '\u{0302}'),
        ("tilde", '\u{0303}'),
        ("widetilde", '\u{0303}'),
        ("bar", '\u{0304}'),
        ("overline", '\u{0305}'),
        ("dot", '\u{0307}'),
        ("ddot", '\u{0308}'),
        ("vec", '\u{20D7}'),
    ] {
        text = replace_command(&text, cmd, |arg| {
            arg.chars().flat_map(|c| [c, mark]).collect()
        });
    }
    text
}

fn is_simple(part: &str) -> bool {
    !part
        .chars()
        .any(|c| c.is_whitespace() || "+-*/=,<>".contains(c))
}

fn parenthesize(part: &str) -> String {
    let part = part.trim();
    if is_simple(part) {
        part.to_string()
    } else {
        format!("({part})")
    }
}

fn replace_fractions(text: &str) -> String {
    let mut result = text.to_string();

    for cmd in ["frac", "dfrac", "tfrac"] {
        let open = format!("\\{cmd}{{");
        while let Some(start) = result.find(&open) {
            let num_start = start + open.len();
            let Some(num_len) = find_matching_brace(&result[num_start..]) else {
                break;
            };
            let num_end = num_start + num_len;
            let rest = &result[num_end + 1..];
            if !rest.starts_with('{') {
                break;
            }
            let den_start = num_end + 2;
            let Some(den_len) = find_matching_brace(&result[den_start..]) else {
                break;
            };

            let numerator = result[num_start..num_end].trim();
            let denominator = result[den_start..den_start + den_len].trim();
            let replacement = VULGAR_FRACTIONS
                .iter()
                .find(|(n, d, _)| *n == numerator && *d == denominator)
                .map(|(_, _, glyph)| glyph.to_string())
                .unwrap_or_else(|| {
                    format!("{}/{}", parenthesize(numerator), parenthesize(denominator))
                });

            result.replace_range(start..den_start + den_len + 1, &replacement);
        }
    }
    result
}

fn replace_roots(text: &str) -> String {
    let mut result = text.to_string();

    // \sqrt[n]{x}
    while let Some(start) = result.find(r"\sqrt[") {
        let index_start = start + r"\sqrt[".len();
        let Some(index_len) = result[index_start..].find(']') else {
            break;
        };
        let index_end = index_start + index_len;
        if !result[index_end + 1..].starts_with('{') {
            break;
        }
        let body_start = index_end + 2;
        let Some(body_len) = find_matching_brace(&result[body_start..]) else {
            break;
        };

        let root = match result[index_start..index_end].trim() {
            "3" => "∛".to_string(),
            "4" => "∜".to_string(),
            n => format!("{}√", to_superscript(n).unwrap_or_else(|| format!("({n})"))),
        };
        let replacement = format!(
            "{root}{}",
            parenthesize(&result[body_start..body_start + body_len])
        );
        result.replace_range(start..body_start + body_len + 1, &replacement);
    }

    replace_command(&result, "sqrt", |arg| format!("√{}", parenthesize(arg)))
}

fn replace_symbols(text: &str) -> Result<String, MathError> {
    let mut unknown = None;
    let result = COMMAND
        .replace_all(text, |caps: &Captures<'_>| match SYMBOLS.get(&caps[1]) {
            Some(symbol) => symbol.to_string(),
            None => {
                unknown.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        })
        .into_owned();

    match unknown {
        Some(name) => Err(MathError::UnknownCommand(name)),
        None => Ok(result),
    }
}

/// Rewrite `^x`, `^{...}`, `_x`, `_{...}` using Unicode scripts where every
/// character has one, `^(...)` otherwise
fn apply_scripts(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '^' && c != '_' {
            out.push(c);
            i += 1;
            continue;
        }

        let (arg, next) = script_argument(&chars, i + 1);
        let converted = if c == '^' {
            to_superscript(&arg)
        } else {
            to_subscript(&arg)
        };
        match converted {
            Some(script) => out.push_str(&script),
            None if arg.chars().count() == 1 => {
                out.push(c);
                out.push_str(&arg);
            }
            None => {
                out.push(c);
                out.push('(');
                out.push_str(&arg);
                out.push(')');
            }
        }
        i = next;
    }
    out
}

/// Argument of a script operator starting at `start`: a braced group or a
/// single character. Returns the argument and the index after it.
fn script_argument(chars: &[char], start: usize) -> (String, usize) {
    match chars.get(start) {
        Some('{') => {
            let mut depth = 1;
            let mut j = start + 1;
            while j < chars.len() {
                match chars[j] {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            let arg: String = chars[start + 1..j.min(chars.len())].iter().collect();
            (arg, (j + 1).min(chars.len()))
        }
        Some(c) => (c.to_string(), start + 1),
        None => (String::new(), start),
    }
}

fn to_superscript(text: &str) -> Option<String> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }
    text.chars()
        .map(|c| {
            Some(match c {
                '0' => '⁰',
                '1' => '¹',
                '2' => '²',
                '3' => '³',
                '4' => '⁴',
                '5' => '⁵',
                '6' => '⁶',
                '7' => '⁷',
                '8' => '⁸',
                '9' => '⁹',
                '+' => '⁺',
                '-' | '−' => '⁻',
                '=' => '⁼',
                '(' => '⁽',
                ')' => '⁾',
                'a' => 'ᵃ',
                'b' => 'ᵇ',
                'c' => 'ᶜ',
                'd' => 'ᵈ',
                'e' => 'ᵉ',
                'f' => 'ᶠ',
                'g' => 'ᵍ',
                'h' => 'ʰ',
                'i' => 'ⁱ',
                'j' => 'ʲ',
                'k' => 'ᵏ',
                'l' => 'ˡ',
                'm' => 'ᵐ',
                'n' => 'ⁿ',
                'o' => 'ᵒ',
                'p' => 'ᵖ',
                'r' => 'ʳ',
                's' => 'ˢ',
                't' => 'ᵗ',
                'u' => 'ᵘ',
                'v' => 'ᵛ',
                'w' => 'ʷ',
                'x' => 'ˣ',
                'y' => 'ʸ',
                'z' => 'ᶻ',
                'A' => 'ᴬ',
                'B' => 'ᴮ',
                'D' => 'ᴰ',
                'E' => 'ᴱ',
                'G' => 'ᴳ',
                'H' => 'ᴴ',
                'I' => 'ᴵ',
                'J' => 'ᴶ',
                'K' => 'ᴷ',
                'L' => 'ᴸ',
                'M' => 'ᴹ',
                'N' => 'ᴺ',
                'O' => 'ᴼ',
                'P' => 'ᴾ',
                'R' => 'ᴿ',
                'T' => 'ᵀ',
                'U' => 'ᵁ',
                'V' => 'ⱽ',
                'W' => 'ᵂ',
                '′' => '′',
                _ => return None,
            })
        })
        .collect()
}

fn to_subscript(text: &str) -> Option<String> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }
    text.chars()
        .map(|c| {
            Some(match c {
                '0' => '₀',
                '1' => '₁',
                '2' => '₂',
                '3' => '₃',
                '4' => '₄',
                '5' => '₅',
                '6' => '₆',
                '7' => '₇',
                '8' => '₈',
                '9' => '₉',
                '+' => '₊',
                '-' | '−' => '₋',
                '=' => '₌',
                '(' => '₍',
                ')' => '₎',
                'a' => 'ₐ',
                'e' => 'ₑ',
                'h' => 'ₕ',
                'i' => 'ᵢ',
                'j' => 'ⱼ',
                'k' => 'ₖ',
                'l' => 'ₗ',
                'm' => 'ₘ',
                'n' => 'ₙ',
                'o' => 'ₒ',
                'p' => 'ₚ',
                'r' => 'ᵣ',
                's' => 'ₛ',
                't' => 'ₜ',
                'u' => 'ᵤ',
                'v' => 'ᵥ',
                'x' => 'ₓ',
                'β' => 'ᵦ',
                'γ' => 'ᵧ',
                'ρ' => 'ᵨ',
                'φ' => 'ᵩ',
                'χ' => 'ᵪ',
                _ => return None,
            })
        })
        .collect()
}
