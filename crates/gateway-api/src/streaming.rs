//! `GET /v1/stream`: upgrades to a WebSocket and multiplexes `BusFrame`s
//! (pool events and audit records) to the client as newline-delimited JSON
//! text frames, grounded in `riptide-api`'s `streaming/websocket.rs`
//! connection-handling shape but with a single outbound-only feed instead
//! of bidirectional message routing.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::state::AppState;

pub async fn stream_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(mut socket: WebSocket, state: AppState) {
    let mut rx = state.bus.subscribe();
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "stream subscriber fell behind, dropping frames");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let line = match serde_json::to_string(&frame) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize event frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(line)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(error = %err, "stream socket error");
                        break;
                    }
                }
            }
        }
    }
}
