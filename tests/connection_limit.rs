//! Connection rate limiting. Kept in its own test binary because the limiter is process-wide.

use persona_chat::agent::ChatAgent;
use persona_chat::llm::chat::gemini::GeminiChatClient;
use persona_chat::llm::chat::openai::AzureOpenAIChatClient;
use persona_chat::server::websocket::serve;
use persona_chat::session::SessionDefaults;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;

#[tokio::test]
async fn burst_of_connections_is_throttled() {
    let agent = ChatAgent::new(
        Arc::new(GeminiChatClient::new(None, None, None)),
        Arc::new(AzureOpenAIChatClient::new(None, None, None, None))
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, Arc::new(agent), SessionDefaults::default()));

    let mut open = Vec::new();
    let mut refused = 0;
    for _ in 0..20 {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => open.push(ws),
            Err(_) => {
                refused += 1;
            }
        }
    }

    assert!(open.len() >= 10, "only {} connections accepted", open.len());
    assert!(refused > 0, "a burst of 20 connections must hit the limit");
}
