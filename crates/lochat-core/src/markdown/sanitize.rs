//! HTML escaping for raw model output

/// Escape the three HTML metacharacters.
///
/// `&` goes first so the entities introduced for `<` and `>` are not
/// escaped a second time.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Inverse of [`escape_html`], also resolving the `&#95;` entity the
/// extractor uses to neutralise reserved placeholder prefixes.
///
/// `&amp;` goes last, otherwise `&amp;lt;` would decode twice.
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#95;", "_")
        .replace("&amp;", "&")
}
