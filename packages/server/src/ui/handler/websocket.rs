//! Signaling relay WebSocket handler.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use kizuna_shared::api::{SignalMessage, SignalingQuery};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{domain::MemberKey, ui::state::AppState, usecase::JoinCommand};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignalingQuery>,
) -> Response {
    // Messages for this member are queued here until the socket is up
    let (tx, rx) = mpsc::unbounded_channel();

    let key = match state
        .join_channel_usecase
        .execute(JoinCommand::from(query), tx)
        .await
    {
        Ok(key) => key,
        Err(e) => {
            let rejection = e.rejection();
            tracing::warn!("Signaling join rejected: {}", e);
            let status =
                StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            return (status, rejection.as_str()).into_response();
        }
    };

    let failed_state = state.clone();
    let failed_key = key.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!("WebSocket upgrade for '{}' failed: {}", failed_key, e);
        tokio::spawn(async move {
            if let Err(e) = failed_state
                .leave_channel_usecase
                .execute(&failed_key)
                .await
            {
                tracing::warn!("Failed to release '{}': {}", failed_key, e);
            }
        });
    })
    .on_upgrade(move |socket| handle_socket(socket, state, key, rx))
}

/// Forward queued messages for this member to its WebSocket.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    key: MemberKey,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();

    let recv_state = state.clone();
    let recv_key = key.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error from '{}': {}", recv_key, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let (kind, published) = match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(SignalMessage::Publish { kind }) => (kind, true),
                        Ok(SignalMessage::Unpublish { kind }) => (kind, false),
                        Ok(other) => {
                            tracing::warn!("Ignoring relay-only message from '{}': {:?}", recv_key, other);
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse message from '{}': {}", recv_key, e);
                            continue;
                        }
                    };
                    if let Err(e) = recv_state
                        .relay_media_usecase
                        .execute(&recv_key, kind, published)
                        .await
                    {
                        tracing::warn!("Relay refused: {}", e);
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Member '{}' requested close", recv_key);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    if let Err(e) = state.leave_channel_usecase.execute(&key).await {
        tracing::warn!("Failed to release '{}': {}", key, e);
    }
}
