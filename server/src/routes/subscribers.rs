//! Subscriber-side routes under `/subscribers`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use syndex_engine::Changes;

use crate::error::Result;
use crate::handlers::{
    handle_flush, handle_list_checkpoints, handle_set_checkpoint, handle_sync,
    CheckpointsResponse, SyncRequest, SyndexBody,
};
use crate::AppState;

/// Create subscriber routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscribers/{name}", delete(flush))
        .route("/subscribers/{name}/sync", post(sync))
        .route("/subscribers/{name}/checkpoints", get(list_checkpoints))
        .route("/subscribers/{name}/checkpoints/{type}", put(set_checkpoint))
}

/// POST /subscribers/{name}/sync - Changes since the subscriber's checkpoint.
async fn sync(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: std::result::Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<Changes>> {
    let Json(request) = request?;
    Ok(Json(handle_sync(state.coordinator, name, request).await?))
}

async fn list_checkpoints(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CheckpointsResponse>> {
    Ok(Json(handle_list_checkpoints(state.coordinator, name).await?))
}

/// PUT /subscribers/{name}/checkpoints/{type} - Rewind or advance a checkpoint.
async fn set_checkpoint(
    State(state): State<AppState>,
    Path((name, type_name)): Path<(String, String)>,
    body: std::result::Result<Json<SyndexBody>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(body) = body?;
    handle_set_checkpoint(state.coordinator, name, type_name, body.syndex).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /subscribers/{name} - Flush every checkpoint of the subscriber.
async fn flush(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode> {
    handle_flush(state.coordinator, name).await?;
    Ok(StatusCode::NO_CONTENT)
}
