// crates/server/src/routes/ws.rs
//! WebSocket push of tree snapshots.
//!
//! GET /api/ws upgrades to a WebSocket. On connect the current tree is sent
//! if a watch is active. After that every broadcast `snapshot` / `clear`
//! event is forwarded as a JSON text frame. There is no incremental
//! protocol: a client that falls behind just gets the current tree again.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;

use crate::live::TreeEvent;
use crate::state::AppState;

const HEARTBEAT: Duration = Duration::from_secs(15);

/// GET /api/ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_event(socket: &mut WebSocket, event: &TreeEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize tree event");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before reading the current tree so nothing falls in between.
    let mut events = state.watch.subscribe();

    if let Some(initial) = state.watch.current_event().await {
        if !send_event(&mut socket, &initial).await {
            return;
        }
    }
    tracing::info!("Tree WebSocket connected");

    let mut heartbeat = tokio::time::interval(HEARTBEAT);
    // Skip the first immediate tick
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WebSocket client lagged, re-sending current tree");
                        state.watch.current_event().await.unwrap_or(TreeEvent::Clear)
                    }
                    Err(RecvError::Closed) => break,
                };
                if !send_event(&mut socket, &event).await {
                    tracing::debug!("Client disconnected during send");
                    return;
                }
            }

            client_msg = socket.recv() => {
                match client_msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Tree WebSocket disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket receive error");
                        return;
                    }
                    // Text, binary and pong frames carry nothing for us.
                    _ => {}
                }
            }

            // Protocol-level ping; fails fast on dead TCP connections.
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(vec![].into())).await.is_err() {
                    tracing::debug!("Client disconnected during heartbeat ping");
                    return;
                }
            }
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}
