// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket message types and the per-connection loop.
//!
//! Messages use internally-tagged JSON enums (`{"type": "join", ...}`). A
//! connection only delivers frames the hub queued for it; it never reads
//! settings itself. Clients pull `GET /api/v1/settings` after connecting.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::hub::{Frame, HubError, Subscription};
use crate::settings::view::SettingsView;
use crate::transport::state::AppState;

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        subscriber: String,
        channels: Vec<String>,
    },
    /// `setting:update` on the public channel.
    SettingUpdate {
        setting: SettingsView,
    },
    Event {
        channel: String,
        event: String,
        payload: serde_json::Value,
    },
    Joined {
        channel: String,
    },
    Left {
        channel: String,
    },
    Pong {},
    Error {
        code: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { channel: String },
    Leave { channel: String },
    Ping {},
}

/// WebSocket upgrade handler. Viewers connect anonymously.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

/// Per-connection event loop.
async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let mut sub = state.hub.connect();
    let subscriber = sub.id();
    tracing::info!(subscriber = %subscriber, "viewer connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let welcome =
        ServerMessage::Welcome { subscriber: subscriber.to_string(), channels: sub.channels() };

    if send_json(&mut ws_tx, &welcome).await.is_ok() {
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                frame = sub.recv() => {
                    let Some(frame) = frame else { break };
                    if send_frame(&mut ws_tx, frame).await.is_err() {
                        break;
                    }
                }
                msg = ws_rx.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(_)) | None => break,
                    };

                    match msg {
                        Message::Text(text) => {
                            let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                                Ok(client_msg) => handle_client_message(&sub, client_msg),
                                Err(_) => ws_error(ErrorCode::MalformedInput, "invalid message"),
                            };
                            if send_json(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }
    }

    // Dropping the subscription leaves every channel.
    drop(sub);
    tracing::info!(subscriber = %subscriber, "viewer disconnected");
}

/// Handle a single client message and return the reply.
pub fn handle_client_message(sub: &Subscription, msg: ClientMessage) -> ServerMessage {
    match msg {
        ClientMessage::Ping {} => ServerMessage::Pong {},
        ClientMessage::Join { channel } => match sub.join(&channel) {
            Ok(()) => ServerMessage::Joined { channel },
            Err(e) => hub_error(&e),
        },
        ClientMessage::Leave { channel } => match sub.leave(&channel) {
            Ok(()) => ServerMessage::Left { channel },
            Err(e) => hub_error(&e),
        },
    }
}

fn hub_error(err: &HubError) -> ServerMessage {
    let code = match err {
        HubError::InvalidChannel(_) | HubError::ReservedChannel(_) => ErrorCode::MalformedInput,
        HubError::Encode(_) => ErrorCode::Internal,
    };
    ws_error(code, &err.to_string())
}

/// Build a WebSocket error message.
fn ws_error(code: ErrorCode, message: &str) -> ServerMessage {
    ServerMessage::Error { code: code.as_str().to_owned(), message: message.to_owned() }
}

async fn send_frame<S>(tx: &mut S, frame: Frame) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    tx.send(Message::Text(frame.as_ref().into())).await.map_err(|_| ())
}

async fn send_json<S>(tx: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(_) => return Err(()),
    };
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
