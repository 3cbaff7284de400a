//! Conversation history
//!
//! Append-only list of messages, oldest first, plus the assembly of the
//! message list sent with each chat request.

use serde::{Deserialize, Serialize};

use crate::attachments::{compose_prompt, Attachment};
use crate::ollama::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

impl Role {
    /// Label shown in the transcript
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
            Role::Error => "Error",
        }
    }

    /// Role on the wire; error messages are never sent
    pub fn api_role(&self) -> Option<&'static str> {
        match self {
            Role::User => Some("user"),
            Role::Assistant => Some("assistant"),
            Role::Error => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages for the next chat request.
    ///
    /// Error messages are dropped, and so is the user message of any turn
    /// that failed (the one directly followed by an error), so a resubmitted
    /// prompt is not sent twice. Document text is prepended to the user
    /// message it was attached to; images travel only with the latest user
    /// message.
    pub fn request_messages(&self) -> Vec<ChatMessage> {
        let kept: Vec<&Message> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(i, msg)| match msg.role {
                Role::Error => false,
                Role::User => !matches!(
                    self.messages.get(i + 1),
                    Some(next) if next.role == Role::Error
                ),
                Role::Assistant => true,
            })
            .map(|(_, msg)| msg)
            .collect();

        let latest_user = kept.iter().rposition(|m| m.role == Role::User);

        kept.iter()
            .enumerate()
            .filter_map(|(i, msg)| {
                let role = msg.role.api_role()?;
                let mut out = match msg.role {
                    Role::User => ChatMessage::new(role, compose_prompt(&msg.content, &msg.attachments)),
                    _ => ChatMessage::new(role, msg.content.as_str()),
                };
                if Some(i) == latest_user {
                    out.images = msg
                        .attachments
                        .iter()
                        .filter_map(|a| a.image_data().map(str::to_string))
                        .collect();
                }
                Some(out)
            })
            .collect()
    }
}
