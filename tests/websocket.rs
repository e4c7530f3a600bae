//! The WebSocket server over a real socket.

use futures::{ SinkExt, StreamExt };
use persona_chat::agent::ChatAgent;
use persona_chat::llm::chat::gemini::GeminiChatClient;
use persona_chat::llm::chat::openai::AzureOpenAIChatClient;
use persona_chat::models::websocket::ServerMessage;
use persona_chat::server::websocket::serve;
use persona_chat::session::SessionDefaults;
use serde_json::json;
use std::sync::Arc;
use tokio::net::{ TcpListener, TcpStream };
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{ connect_async, MaybeTlsStream, WebSocketStream };
use wiremock::matchers::{ method, path_regex };
use wiremock::{ Mock, MockServer, ResponseTemplate };

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(backend: &MockServer) -> String {
    let agent = ChatAgent::new(
        Arc::new(GeminiChatClient::new(Some("g".into()), None, Some(backend.uri()))),
        Arc::new(AzureOpenAIChatClient::new(None, None, None, None))
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::new(agent), SessionDefaults::default()));
    format!("ws://{}", addr)
}

async fn next_frame(ws: &mut Client) -> ServerMessage {
    match ws.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {:?}", other),
    }
}

async fn connect(url: &str) -> Client {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

#[tokio::test]
async fn greets_then_answers_chat() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1beta/models/.*:generateContent$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello there" }] } }]
        })
            )
        )
        .expect(1)
        .mount(&backend).await;
    let mut ws = connect(&start(&backend).await).await;

    match next_frame(&mut ws).await {
        ServerMessage::Session { id, system_prompt } => {
            assert!(!id.is_empty());
            assert_eq!(system_prompt, "You are a helpful assistant.");
        }
        other => panic!("unexpected frame: {:?}", other),
    }

    ws.send(Message::Text(json!({ "type": "chat", "content": "Hi" }).to_string())).await.unwrap();
    assert_eq!(next_frame(&mut ws).await, ServerMessage::Processing);
    assert!(
        matches!(next_frame(&mut ws).await, ServerMessage::Response { ref content, .. } if content == "Hello there")
    );
}

#[tokio::test]
async fn invalid_frame_gets_error_and_connection_stays_open() {
    let backend = MockServer::start().await;
    let mut ws = connect(&start(&backend).await).await;
    next_frame(&mut ws).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    assert!(
        matches!(next_frame(&mut ws).await, ServerMessage::Error { ref message } if message.starts_with("Invalid message format"))
    );

    ws.send(Message::Text(json!({ "type": "history" }).to_string())).await.unwrap();
    assert!(
        matches!(next_frame(&mut ws).await, ServerMessage::History { ref messages } if messages.len() == 1)
    );
}

#[tokio::test]
async fn oversized_message_closes_connection() {
    let backend = MockServer::start().await;
    let mut ws = connect(&start(&backend).await).await;
    next_frame(&mut ws).await;

    ws.send(Message::Text("x".repeat(2 * 1024 * 1024))).await.unwrap();

    assert_eq!(next_frame(&mut ws).await, ServerMessage::Error {
        message: "Message too large".to_string(),
    });
    match ws.next().await {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Size),
        other => panic!("expected a close frame, got {:?}", other),
    }
    assert!(matches!(ws.next().await, None | Some(Err(_))));
}
