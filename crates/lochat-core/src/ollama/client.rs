//! HTTP client for the Ollama API

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::{ClientError, ClientResult};
use super::ndjson::{LineEvent, NdjsonProcessor};
use super::streaming::StreamEvent;
use super::types::{ChatChunk, ChatMessage, ChatRequest, ErrorBody, TagsResponse};
use crate::config::Config;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for one Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    /// Bounds connecting, the response headers and every gap between chunks
    request_timeout: Duration,
    list_timeout: Duration,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            list_timeout: DEFAULT_LIST_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.host.as_str())
            .with_timeouts(config.request_timeout(), config.list_timeout())
    }

    pub fn with_timeouts(mut self, request: Duration, list: Duration) -> Self {
        self.request_timeout = request;
        self.list_timeout = list;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into [`ClientError::Status`]
    async fn handle_error_response(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text)
            .map(|e| e.error)
            .unwrap_or(text);
        warn!("Ollama returned {}: {}", status, body);
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// List installed model identifiers (`GET /api/tags`)
    pub async fn list_models(&self) -> ClientResult<Vec<String>> {
        let result = self.fetch_tags().await;
        match &result {
            Ok(models) => debug!("{} models available at {}", models.len(), self.base_url),
            Err(e) => warn!("Failed to list models from {}: {}", self.base_url, e),
        }
        result
    }

    async fn fetch_tags(&self) -> ClientResult<Vec<String>> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .timeout(self.list_timeout)
            .send()
            .await?;
        let response = self.handle_error_response(response).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Single non-streaming chat call
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> ClientResult<String> {
        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };

        info!("Calling {} (non-streaming, {} messages)", model, messages.len());
        let response = self
            .http
            .post(self.url("/api/chat"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        let response = self.handle_error_response(response).await?;

        let chunk: ChatChunk = response.json().await?;
        if let Some(error) = chunk.error {
            return Err(ClientError::Server(error));
        }
        Ok(chunk.content().unwrap_or_default().to_string())
    }

    /// Streaming chat call.
    ///
    /// Every text fragment is forwarded to `tx` as [`StreamEvent::Chunk`] as
    /// soon as it is decoded; the full reply is returned at the end. The
    /// terminal event is left to the caller. Reading stops early, with the
    /// text so far, once the receiver is dropped.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tx: &mpsc::UnboundedSender<StreamEvent>,
    ) -> ClientResult<String> {
        let body = ChatRequest {
            model,
            messages,
            stream: true,
        };

        info!("Starting chat stream with {} ({} messages)", model, messages.len());
        let send = self.http.post(self.url("/api/chat")).json(&body).send();
        let response = timeout(self.request_timeout, send)
            .await
            .map_err(|_| ClientError::Timeout)??;
        let response = self.handle_error_response(response).await?;

        let mut stream = response.bytes_stream();
        let mut processor = NdjsonProcessor::new();
        let mut full_response = String::new();

        loop {
            let next = timeout(self.request_timeout, stream.next())
                .await
                .map_err(|_| {
                    warn!("No data from {} for {:?}", model, self.request_timeout);
                    ClientError::Timeout
                })?;

            let (events, eof) = match next {
                Some(chunk) => (processor.process_chunk(&chunk?), false),
                None => (processor.finish(), true),
            };

            let mut done = false;
            for event in events {
                match event {
                    LineEvent::Delta(text) => {
                        full_response.push_str(&text);
                        if tx.send(StreamEvent::chunk(text)).is_err() {
                            debug!("Receiver for {} dropped, abandoning stream", model);
                            return Ok(full_response);
                        }
                    }
                    LineEvent::Done => done = true,
                    LineEvent::ServerError(error) => return Err(ClientError::Server(error)),
                }
            }

            if done {
                break;
            }
            if eof {
                warn!("Stream from {} ended without a done marker", model);
                break;
            }
        }

        info!("Chat stream complete: {} chars", full_response.len());
        Ok(full_response)
    }

    /// Run [`chat_stream`](Self::chat_stream) on its own task.
    ///
    /// The receiver yields the chunks followed by exactly one
    /// [`StreamEvent::Done`] or [`StreamEvent::Failed`].
    pub fn spawn_chat_stream(
        &self,
        model: String,
        messages: Vec<ChatMessage>,
    ) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();

        tokio::spawn(async move {
            let event = match client.chat_stream(&model, &messages, &tx).await {
                Ok(_) => StreamEvent::Done,
                Err(e) => {
                    warn!("Chat stream failed: {}", e);
                    StreamEvent::failed(e.to_string())
                }
            };
            let _ = tx.send(event);
        });

        rx
    }
}
