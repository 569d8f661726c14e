//! WebSocket task-event feed.
//!
//! Clients get a full snapshot of active tasks on connect, then a live
//! stream of scheduler events. A lagging client is re-synced with a fresh
//! snapshot instead of being dropped.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::scheduler::{TaskEvent, TaskRecord};

use super::routes::AppState;

/// Server-to-client messages outside the plain event stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    /// Full snapshot of all non-terminal tasks.
    TasksSync { tasks: Vec<TaskRecord> },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");

    if !send_sync(&mut socket, &state).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    let mut rx = state.scheduler.subscribe();

    loop {
        tokio::select! {
            // Forward scheduler events to this client
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind broadcast");
                        if !send_sync(&mut socket, &state).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            // The feed is one-way; clients only send pings and close frames.
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(text = %text, "Ignoring inbound WS message");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Send a full active-task snapshot. Returns false if the client is gone.
async fn send_sync(socket: &mut WebSocket, state: &AppState) -> bool {
    let tasks: Vec<TaskRecord> = state
        .scheduler
        .list(None, None)
        .await
        .into_iter()
        .filter(|t| t.status.is_active())
        .collect();
    let sync = WsMessage::TasksSync { tasks };
    match serde_json::to_string(&sync) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}

async fn send_event(socket: &mut WebSocket, event: &TaskEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}
