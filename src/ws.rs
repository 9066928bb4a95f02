//! WebSocket transport: one connection is one player session.
//!
//! The connection task is a thin adapter. It feeds join/leave/command
//! events into the core and forwards envelopes from the outbound channel
//! to its socket, filtering on the target.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::game::GameEvent;
use crate::protocol::{ClientMessage, Envelope, ServerMessage, Target};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub nickname: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    if state.game.lock().await.is_full() {
        if let Ok(json) = serde_json::to_string(&ServerMessage::chat("Room is full.")) {
            let _ = sender.send(Message::Text(json.into())).await;
        }
        return;
    }

    let session_id = ulid::Ulid::new().to_string();
    tracing::info!("WebSocket connected: {}", session_id);

    // Subscribe before joining so this connection sees its own join.
    let mut outbound_rx = state.outbound.subscribe();

    state
        .dispatch(GameEvent::PlayerJoined {
            session_id: session_id.clone(),
            nickname: params.nickname.unwrap_or_default(),
        })
        .await;

    loop {
        tokio::select! {
            envelope = outbound_rx.recv() => {
                match envelope {
                    Ok(Envelope { target, message }) => {
                        let mine = match &target {
                            Target::All => true,
                            Target::One(id) => *id == session_id,
                        };
                        if !mine {
                            continue;
                        }
                        if let Ok(json) = serde_json::to_string(&message) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Connection {} lagged, skipped {} messages", session_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                state
                                    .dispatch(GameEvent::Command {
                                        session_id: session_id.clone(),
                                        message,
                                    })
                                    .await;
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("WebSocket closed: {}", session_id);
    state.dispatch(GameEvent::PlayerLeft { session_id }).await;
}
