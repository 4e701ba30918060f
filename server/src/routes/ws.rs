//! WebSocket upgrade route.

use axum::{
    extract::{rejection::QueryRejection, Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::handle_websocket_connection;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct WsQuery {
    subscriber: String,
}

/// Create WebSocket routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

/// GET /ws?subscriber=name - Upgrade to a notification socket.
async fn upgrade(
    State(state): State<AppState>,
    query: Result<Query<WsQuery>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Response {
    let subscriber = match query
        .map_err(AppError::from)
        .and_then(|Query(query)| {
            syndex_engine::sanitize::require("name", &query.subscriber).map_err(AppError::from)
        }) {
        Ok(name) => name,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, state.coordinator, state.conn_manager, subscriber)
    })
}
