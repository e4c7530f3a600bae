use crate::agent::ChatAgent;
use crate::config::persona::{ PersonaSettings, Tone };
use crate::llm::{ BackendKind, GenerationConfig, SettingsError };
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::{ ChatSession, SessionDefaults };

use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::{ CloseFrame, coding::CloseCode };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use chrono::Utc;
use log::{ info, warn, error, debug };
use futures::{ SinkExt, StreamExt };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const CONNECTIONS_PER_SECOND: u32 = 10;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::new(CONNECTIONS_PER_SECOND).unwrap_or(NonZeroU32::MIN)));
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<ChatAgent>,
    defaults: SessionDefaults
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);
    serve(listener, agent, defaults).await
}

/// Accept loop; every connection gets its own [`ChatSession`].
pub async fn serve(
    listener: TcpListener,
    agent: Arc<ChatAgent>,
    defaults: SessionDefaults
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let session = ChatSession::new(defaults.clone());

        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => handle_connection(peer, ws, agent_clone, session).await,
                Err(e) => error!("Handshake failed for {}: {}", peer, e),
            }
        });
    }
}

async fn send_json<S>(
    tx: &mut futures::stream::SplitSink<WebSocketStream<S>, Message>,
    msg: &ServerMessage
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<ChatAgent>,
    mut session: ChatSession
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);
    let (mut tx, mut rx) = websocket.split();
    info!("Assigned session ID {} to {}", session.id(), peer);

    let hello = ServerMessage::Session {
        id: session.id().to_string(),
        system_prompt: session.system_prompt(),
    };
    if let Err(e) = send_json(&mut tx, &hello).await {
        error!("Failed to greet {}: {}", peer, e);
        return;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(m) => m,
            Err(e) => {
                error!("Error receiving message from {}: {}", peer, e);
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let error_msg = ServerMessage::Error {
                message: "Message too large".to_string(),
            };
            if send_json(&mut tx, &error_msg).await.is_err() {
                error!("Failed to send size limit error to {}", peer);
            }
            let close = CloseFrame {
                code: CloseCode::Size,
                reason: "Message too large".into(),
            };
            if let Err(e) = tx.send(Message::Close(Some(close))).await {
                debug!("Close frame to {} not delivered: {}", peer, e);
            }
            break;
        }

        match message {
            Message::Text(text) => {
                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Invalid message from {}: {}", peer, e);
                        let err = ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        };
                        if send_json(&mut tx, &err).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                if matches!(client_msg, ClientMessage::Chat { .. }) {
                    if let Err(e) = send_json(&mut tx, &ServerMessage::Processing).await {
                        error!("Error sending processing status to {}: {}", peer, e);
                        break;
                    }
                }

                let reply = respond(&agent, &mut session, client_msg).await;
                if let Err(e) = send_json(&mut tx, &reply).await {
                    error!("Error sending reply to {}: {}", peer, e);
                    break;
                }
            }
            Message::Close(_) => {
                info!("Client {} closed the connection", peer);
                break;
            }
            Message::Ping(data) => {
                if tx.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            other => debug!("Ignoring non-text frame from {}: {:?}", peer, other),
        }
    }

    info!("Session {} for {} ended", session.id(), peer);
}

/// Applies one client frame to the session and builds the frame to send back.
pub async fn respond(
    agent: &ChatAgent,
    session: &mut ChatSession,
    msg: ClientMessage
) -> ServerMessage {
    match msg {
        ClientMessage::Chat { content } =>
            match agent.process_message(session, &content).await {
                Ok(reply) =>
                    ServerMessage::Response {
                        content: reply,
                        timestamp: Utc::now().timestamp(),
                    },
                Err(e) => ServerMessage::Error { message: e.to_string() },
            }
        ClientMessage::Settings { backend, generation, persona, tone } => {
            match apply_settings(session, backend, generation, persona, tone) {
                Ok(reset) =>
                    ServerMessage::SettingsApplied {
                        system_prompt: session.system_prompt(),
                        reset,
                    },
                Err(e) => ServerMessage::Error { message: e.to_string() },
            }
        }
        ClientMessage::Reset => {
            session.clear();
            ServerMessage::SettingsApplied {
                system_prompt: session.system_prompt(),
                reset: true,
            }
        }
        ClientMessage::History =>
            ServerMessage::History {
                messages: session.conversation().messages().to_vec(),
            },
    }
}

/// All-or-nothing: nothing changes unless every supplied field is valid.
fn apply_settings(
    session: &mut ChatSession,
    backend: Option<BackendKind>,
    generation: Option<GenerationConfig>,
    persona: Option<String>,
    tone: Option<String>
) -> Result<bool, SettingsError> {
    let tone = tone.map(|t| t.parse::<Tone>()).transpose()?;
    if let Some(config) = &generation {
        config.validate()?;
    }

    if let Some(kind) = backend {
        session.select_backend(kind);
    }
    if let Some(config) = generation {
        session.update_generation(config)?;
    }
    if persona.is_none() && tone.is_none() {
        return Ok(false);
    }
    let current = session.persona().clone();
    Ok(
        session.apply_persona(PersonaSettings {
            persona: persona.unwrap_or(current.persona),
            tone: tone.unwrap_or(current.tone),
        })
    )
}
