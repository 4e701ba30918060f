//! WebSocket handler for real-time notifications.
//!
//! Each connection belongs to one subscriber. It receives every `marked`
//! broadcast and may sync over the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use syndex_engine::SyncCoordinator;
use tokio::sync::mpsc;

use crate::websocket::{ClientMessage, ConnectionManager, ServerMessage};

use super::{handle_sync, SyncRequest};

/// Serve one subscriber socket until the client goes away.
///
/// Outgoing traffic (broadcasts and replies) goes through the manager's
/// channel; a forwarder task drains it into the socket.
pub async fn handle_websocket_connection(
    socket: WebSocket,
    coordinator: Arc<SyncCoordinator>,
    conn_manager: Arc<ConnectionManager>,
    subscriber: String,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = conn_manager.register(subscriber.clone(), tx);

    tracing::info!(
        conn_id = %conn_id,
        subscriber = %subscriber,
        "WebSocket client connected"
    );

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(&text, &coordinator, &subscriber).await;
                conn_manager.send_to(&conn_id, response);
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        subscriber = %subscriber,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Process a client message and return a server response.
pub(crate) async fn process_message(
    text: &str,
    coordinator: &Arc<SyncCoordinator>,
    subscriber: &str,
) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None, None);
        }
    };

    match client_msg {
        ClientMessage::Sync {
            type_name,
            reset_syndex,
            request_id,
        } => {
            let request = SyncRequest {
                type_name: type_name.clone(),
                reset_syndex,
            };

            match handle_sync(Arc::clone(coordinator), subscriber.to_string(), request).await {
                Ok(changes) => ServerMessage::SyncResponse {
                    type_name: syndex_engine::sanitize(&type_name),
                    ids: changes.ids,
                    syndex: changes.syndex,
                    request_id,
                },
                Err(e) => {
                    let (status, body) = e.parts();
                    if status.is_server_error() {
                        tracing::error!(subscriber = %subscriber, "WebSocket sync failed: {}", e);
                    }
                    ServerMessage::error(body.error, Some(body.code), request_id)
                }
            }
        }

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
