//! Ollama wire types

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

/// One message in a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// Base64-encoded images, only sent on the latest user turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// One NDJSON object of a chat response (streamed or not)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: String,
}

impl ChatChunk {
    /// Text fragment carried by this chunk, if any
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.content.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// Response of `GET /api/tags`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_omitted_when_empty() {
        let msg = ChatMessage::new("user", "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("images").is_none());

        let mut msg = msg;
        msg.images.push("aGk=".to_string());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["images"][0], "aGk=");
    }

    #[test]
    fn test_chunk_parsing() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"model":"m","message":{"role":"assistant","content":"Hi"},"done":false}"#)
                .unwrap();
        assert_eq!(chunk.content(), Some("Hi"));
        assert!(!chunk.done);

        let last: ChatChunk =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":""},"done":true,"eval_count":3}"#)
                .unwrap();
        assert_eq!(last.content(), None);
        assert!(last.done);

        let err: ChatChunk = serde_json::from_str(r#"{"error":"model 'x' not found"}"#).unwrap();
        assert_eq!(err.error.as_deref(), Some("model 'x' not found"));
    }
}
