use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use super::state::AppState;

#[derive(Debug, Deserialize)]
struct WsIncoming {
    #[serde(rename = "type")]
    msg_type: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from client: {}", client_id);
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, state: Arc<AppState>) {
    tracing::info!("WebSocket connected: {}", client_id);
    state.client_connected(&client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe();
    // Pongs go to this client only
    let (pong_tx, mut pong_rx) = mpsc::channel::<()>(8);

    // Task to forward session events (and pongs) to this client
    let send_task = tokio::spawn(async move {
        loop {
            let json = tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(_) => continue,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("WebSocket client lagged, {} events skipped", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(()) = pong_rx.recv() => r#"{"type":"pong"}"#.to_string(),
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Task to handle incoming messages (ping/pong)
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(incoming) = serde_json::from_str::<WsIncoming>(&text) {
                    if incoming.msg_type == "ping" {
                        let _ = pong_tx.send(()).await;
                    }
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.client_disconnected(&client_id);
    tracing::info!("WebSocket disconnected: {}", client_id);
}
