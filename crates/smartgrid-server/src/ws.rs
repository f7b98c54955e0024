//! WebSocket stream of session events
//!
//! Clients connect to /api/v1/ws, receive a status snapshot, then every
//! session event as tagged JSON in publish order.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use smartgrid_core::events::{EventListener, SessionEvent};
use tokio::sync::broadcast;

/// Forwards session events to the WebSocket broadcast channel
pub struct BroadcastListener {
    tx: broadcast::Sender<String>,
}

impl BroadcastListener {
    pub fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl EventListener for BroadcastListener {
    fn name(&self) -> &str {
        "websocket"
    }

    fn on_event(&mut self, event: &SessionEvent) -> anyhow::Result<()> {
        if self.tx.receiver_count() == 0 {
            return Ok(());
        }
        let json = serde_json::to_string(event)?;
        // Receivers may disconnect between the check and the send
        let _ = self.tx.send(json);
        Ok(())
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before the snapshot so no event falls between the two
    let mut rx = state.events_tx.subscribe();

    if let Ok(snapshot) = state.session.snapshot().await {
        let json = serde_json::json!({ "type": "snapshot", "session": snapshot });
        let _ = ws_sender.send(Message::Text(json.to_string().into())).await;
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket client lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::debug!("WebSocket client disconnected");
}
