//! Ollama client against a mock HTTP server

use std::time::Duration;

use lochat_core::conversation::Role;
use lochat_core::markdown::{render, RenderTheme};
use lochat_core::ollama::{ChatMessage, ClientError, OllamaClient, StreamEvent};
use lochat_core::session::{DisplaySurface, Frame, SessionController, TurnState};
use mockito::Matcher;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn ndjson(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        body.push_str(&json!({"message": {"role": "assistant", "content": part}, "done": false}).to_string());
        body.push('\n');
    }
    body.push_str(&json!({"message": {"role": "assistant", "content": ""}, "done": true}).to_string());
    body.push('\n');
    body
}

/// Server that answers with one NDJSON line and then goes quiet
async fn stalling_server(first_line: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        // Request body is a JSON object
        while !request.ends_with(b"}") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let line = format!("{first_line}\n");
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{line}\r\n",
            line.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    format!("http://{addr}")
}

/// Server that accepts the connection and never answers
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });
    format!("http://{addr}")
}

fn partial_line() -> String {
    json!({"message": {"role": "assistant", "content": "partial"}, "done": false}).to_string()
}

async fn drain(mut rx: mpsc::UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

#[tokio::test]
async fn test_list_models() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"models":[{"name":"llama3.2:latest","size":1},{"name":"qwen2.5:7b"}]}"#)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let models = client.list_models().await.unwrap();
    assert_eq!(models, vec!["llama3.2:latest", "qwen2.5:7b"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_models_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(500)
        .with_body(r#"{"error":"boom"}"#)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    match client.list_models().await {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_stream_forwards_chunks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"model": "llama3.2", "stream": true})))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(ndjson(&["Hel", "lo ", "**there**"]))
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let messages = vec![ChatMessage::new("user", "hi")];
    let full = client.chat_stream("llama3.2", &messages, &tx).await.unwrap();
    drop(tx);

    assert_eq!(full, "Hello **there**");
    let mut chunks = Vec::new();
    while let Some(event) = rx.recv().await {
        chunks.push(event);
    }
    assert_eq!(
        chunks,
        vec![
            StreamEvent::chunk("Hel"),
            StreamEvent::chunk("lo "),
            StreamEvent::chunk("**there**"),
        ]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_images_sent_with_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "messages": [{"role": "user", "content": "what is this?", "images": ["aGVsbG8="]}]
        })))
        .with_status(200)
        .with_body(ndjson(&["a cat"]))
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let mut message = ChatMessage::new("user", "what is this?");
    message.images.push("aGVsbG8=".to_string());
    let (tx, _rx) = mpsc::unbounded_channel();
    let reply = client.chat_stream("llava", &[message], &tx).await.unwrap();
    assert_eq!(reply, "a cat");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let mut server = mockito::Server::new_async().await;
    let body = format!("this is not json\n{}", ndjson(&["ok"]));
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let events = drain(client.spawn_chat_stream("m".to_string(), vec![ChatMessage::new("user", "x")])).await;
    assert_eq!(events, vec![StreamEvent::chunk("ok"), StreamEvent::Done]);
}

#[tokio::test]
async fn test_server_error_object_fails_turn() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        "{}\n{}\n",
        json!({"message": {"role": "assistant", "content": "par"}, "done": false}),
        json!({"error": "model runner crashed"})
    );
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let events = drain(client.spawn_chat_stream("m".to_string(), vec![ChatMessage::new("user", "x")])).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::chunk("par"));
    match &events[1] {
        StreamEvent::Failed { error } => assert!(error.contains("model runner crashed")),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found_status_fails_turn() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body(r#"{"error":"model \"nope\" not found, try pulling it first"}"#)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let events = drain(client.spawn_chat_stream("nope".to_string(), vec![ChatMessage::new("user", "x")])).await;
    match events.as_slice() {
        [StreamEvent::Failed { error }] => {
            assert!(error.contains("404"));
            assert!(error.contains("not found"));
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_streaming_chat() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"stream": false})))
        .with_status(200)
        .with_body(r#"{"message":{"role":"assistant","content":"42"},"done":true}"#)
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let reply = client
        .chat("m", &[ChatMessage::new("user", "answer?")])
        .await
        .unwrap();
    assert_eq!(reply, "42");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Port 9 (discard) is not served in the test environment
    let client = OllamaClient::new("http://127.0.0.1:9")
        .with_timeouts(Duration::from_secs(2), Duration::from_secs(2));
    let err = client.list_models().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_) | ClientError::Timeout));
}

#[tokio::test]
async fn test_stalled_stream_times_out_and_fails_turn() {
    let url = stalling_server(partial_line()).await;
    let client = OllamaClient::new(url)
        .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));

    let mut session = SessionController::new(LastFrame::default(), RenderTheme::default());
    let messages = session.begin_turn("tell me", vec![]).unwrap();
    let events = drain(client.spawn_chat_stream("m".to_string(), messages)).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::chunk("partial"));
    match &events[1] {
        StreamEvent::Failed { error } => assert!(error.contains("timed out")),
        other => panic!("unexpected event: {other:?}"),
    }

    for event in events {
        session.handle_event(event).unwrap();
    }
    assert_eq!(session.state(), TurnState::Failed);
    assert_eq!(session.buffer(), "");
    let history = session.history().messages();
    assert_eq!(history.last().map(|m| m.role), Some(Role::Error));
    assert!(history
        .iter()
        .all(|m| m.role != Role::Assistant && !m.content.contains("partial")));
}

#[tokio::test]
async fn test_no_response_headers_times_out() {
    let client = OllamaClient::new(silent_server().await)
        .with_timeouts(Duration::from_millis(300), Duration::from_millis(300));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = client
        .chat_stream("m", &[ChatMessage::new("user", "x")], &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
    drop(tx);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_dropped_receiver_stops_reading() {
    let url = stalling_server(partial_line()).await;
    let client = OllamaClient::new(url)
        .with_timeouts(Duration::from_secs(30), Duration::from_secs(30));

    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let messages = [ChatMessage::new("user", "x")];
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        client.chat_stream("m", &messages, &tx),
    )
    .await
    .expect("stream kept reading after the receiver was dropped")
    .unwrap();
    assert_eq!(reply, "partial");
}

#[derive(Default)]
struct LastFrame {
    turn_html: String,
    state: Option<TurnState>,
    frames: usize,
}

impl DisplaySurface for LastFrame {
    fn publish(&mut self, frame: &Frame<'_>) {
        self.turn_html = frame.turn_html.to_string();
        self.state = Some(frame.state);
        self.frames += 1;
    }
}

#[tokio::test]
async fn test_session_end_to_end() {
    let reply = ["# Result\n", "Use `cargo`", " and pay $10.\n", "```sh\necho hi\n", "```"];
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(ndjson(&reply))
        .create_async()
        .await;

    let client = OllamaClient::new(server.url());
    let mut session = SessionController::new(LastFrame::default(), RenderTheme::default());
    let messages = session.begin_turn("how?", vec![]).unwrap();
    let mut rx = client.spawn_chat_stream("m".to_string(), messages);

    let mut final_html = String::new();
    while let Some(event) = rx.recv().await {
        if session.handle_event(event).unwrap() != TurnState::Streaming {
            break;
        }
        final_html = session.surface().turn_html.clone();
    }

    let full: String = reply.concat();
    assert_eq!(session.state(), TurnState::Complete);
    assert_eq!(session.surface().state, Some(TurnState::Complete));
    assert_eq!(final_html, render(&full));
    assert_eq!(session.surface().frames, 1 + reply.len() + 1);
    assert_eq!(
        session.history().messages().last().map(|m| m.content.as_str()),
        Some(full.as_str())
    );
}
