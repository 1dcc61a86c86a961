//! WebSocket chat — one conversation per connection.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::AppState;
use super::protocol::{ClientMessage, ServerMessage};
use crate::conversation::ConversationSession;

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let session = state.registry.create().await;
    let session_id = session.id();
    info!(session_id = %session_id, "WebSocket client connected");

    let mut rx = session.subscribe();

    let sync = ServerMessage::sync(session_id, session.snapshot().await);
    if !send(&mut socket, &sync).await {
        warn!(session_id = %session_id, "Failed to send initial sync, client disconnected");
        state.registry.remove(session_id).await;
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(ops) => {
                        if !send(&mut socket, &ServerMessage::Ops { ops }).await {
                            debug!(session_id = %session_id, "Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(session_id = %session_id, missed = n, "WS client lagged behind");
                        let sync = ServerMessage::sync(session_id, session.snapshot().await);
                        if !send(&mut socket, &sync).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_message(&text, &session).await {
                            if !send(&mut socket, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session_id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    session.close().await;
    state.registry.remove(session_id).await;
    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Apply a client message. Render output reaches the client through the
/// session broadcast; only rejections are answered directly.
async fn handle_client_message(
    text: &str,
    session: &Arc<ConversationSession>,
) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
            return Some(ServerMessage::Error {
                message: format!("Unrecognized message: {e}"),
            });
        }
    };

    match message {
        ClientMessage::Select { index } => match session.select(index).await {
            Ok(_) => None,
            Err(e) => {
                debug!(session_id = %session.id(), error = %e, "Selection rejected");
                Some(ServerMessage::Error {
                    message: e.to_string(),
                })
            }
        },
        ClientMessage::Reset => {
            session.reset().await;
            None
        }
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize server message");
            true
        }
    }
}
