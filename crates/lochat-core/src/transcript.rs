//! Transcript rendering
//!
//! Renders the whole conversation (role label, attachment markers, message
//! body) into HTML. Finished messages go through the [`MarkdownCache`]; only
//! the in-flight turn is rendered from scratch on every chunk.

use crate::attachments::Attachment;
use crate::conversation::{History, Message, Role};
use crate::markdown::{escape_html, MarkdownCache, RenderTheme};

fn role_color(role: Role, theme: &RenderTheme) -> &'static str {
    match role {
        Role::User => theme.user_msg_color,
        Role::Assistant => theme.assistant_msg_color,
        Role::Error => theme.error_color,
    }
}

/// Wrap an already rendered body in a labelled message block
pub fn message_html(
    role: Role,
    body_html: &str,
    attachments: &[Attachment],
    theme: &RenderTheme,
) -> String {
    let markers: String = attachments
        .iter()
        .map(|a| {
            format!(
                "<span class=\"attachment\" style=\"color: {}; font-size: 0.9em; margin-right: 8px;\">{}</span>",
                theme.dim_color,
                escape_html(&a.marker())
            )
        })
        .collect();
    let markers = if markers.is_empty() {
        markers
    } else {
        format!("<div class=\"attachments\" style=\"margin-left: 20px;\">{markers}</div>")
    };

    format!(
        "<div class=\"message {}\" style=\"margin: 10px 0;\"><b style=\"color: {};\">{}:</b>{markers}\
         <div class=\"message-body\" style=\"margin-left: 20px;\">{body_html}</div></div>",
        role.api_role().unwrap_or("error"),
        role_color(role, theme),
        role.label()
    )
}

/// Render one finished message
pub fn render_message(message: &Message, theme: &RenderTheme, cache: &mut MarkdownCache) -> String {
    let body = cache.get_or_render(&message.content, theme);
    message_html(message.role, &body, &message.attachments, theme)
}

/// Render every message in `history`, oldest first
pub fn render_history(history: &History, theme: &RenderTheme, cache: &mut MarkdownCache) -> String {
    history
        .messages()
        .iter()
        .map(|m| render_message(m, theme, cache))
        .collect()
}

/// Standalone HTML page around a rendered transcript
pub fn html_document(body: &str, theme: &RenderTheme) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>lochat</title>\n</head>\n\
         <body style=\"background-color: {}; color: {}; font-family: 'Segoe UI', Arial, sans-serif; \
         font-size: 14px; line-height: 1.5; padding: 16px;\">\n{body}\n</body>\n</html>\n",
        theme.bg_color, theme.text_color
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{AttachmentKind, AttachmentPayload};

    #[test]
    fn test_message_block() {
        let theme = RenderTheme::default();
        let attachment = Attachment {
            name: "<cat>.png".to_string(),
            kind: AttachmentKind::Image,
            payload: AttachmentPayload::Base64("AAAA".to_string()),
        };
        let html = message_html(Role::User, "hi", &[attachment], &theme);
        assert!(html.contains(theme.user_msg_color));
        assert!(html.contains(">You:</b>"));
        assert!(html.contains("📎 &lt;cat&gt;.png"));
        assert!(!html.contains("AAAA"));
    }

    #[test]
    fn test_history_uses_markdown() {
        let theme = RenderTheme::default();
        let mut cache = MarkdownCache::new();
        let mut history = History::new();
        history.push(Message::user("**question**", vec![]));
        history.push(Message::assistant("`answer`"));
        history.push(Message::error("request <timed> out"));

        let html = render_history(&history, &theme, &mut cache);
        assert!(html.contains("<strong>question</strong>"));
        assert!(html.contains(">answer</code>"));
        assert!(html.contains("request &lt;timed&gt; out"));
        assert!(html.contains(theme.error_color));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_document_wrapper() {
        let theme = RenderTheme::default();
        let page = html_document("<p>x</p>", &theme);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(theme.bg_color));
        assert!(page.contains("<p>x</p>"));
    }
}
