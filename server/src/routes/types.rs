//! Master-side routes under `/types`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use syndex_engine::{ChangeRecord, Changes, TypeInfo};

use crate::error::Result;
use crate::handlers::{
    handle_bump_syndex, handle_changes, handle_find, handle_get_syndex, handle_list_types,
    handle_mark, handle_record_write, handle_register, handle_reset, handle_set_syndex,
    handle_type_info, ChangesQuery, MarkRequest, MarkResponse, RecordWrite, SyndexBody,
    TypesResponse,
};
use crate::AppState;

/// Create type routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/types", get(list_types).delete(reset))
        .route("/types/{type}", get(type_info).post(register))
        .route("/types/{type}/mark", post(mark))
        .route(
            "/types/{type}/records/{id}",
            get(find)
                .post(insert)
                .put(upsert)
                .patch(update)
                .delete(remove),
        )
        .route("/types/{type}/syndex", get(get_syndex).put(set_syndex))
        .route("/types/{type}/syndex/bump", post(bump_syndex))
        .route("/types/{type}/changes", get(changes))
}

/// GET /types - List registered types.
async fn list_types(State(state): State<AppState>) -> Result<Json<TypesResponse>> {
    Ok(Json(handle_list_types(state.coordinator).await?))
}

/// DELETE /types - Flush the whole ledger and every checkpoint.
async fn reset(State(state): State<AppState>) -> Result<StatusCode> {
    handle_reset(state.coordinator).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /types/{type} - Register a type.
async fn register(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
) -> Result<(StatusCode, Json<TypeInfo>)> {
    let info = handle_register(state.coordinator, type_name).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// GET /types/{type} - Type info.
async fn type_info(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
) -> Result<Json<TypeInfo>> {
    Ok(Json(handle_type_info(state.coordinator, type_name).await?))
}

/// POST /types/{type}/mark - Mark one or many ids as changed.
async fn mark(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
    request: std::result::Result<Json<MarkRequest>, JsonRejection>,
) -> Result<Json<MarkResponse>> {
    let Json(request) = request?;
    Ok(Json(handle_mark(state.coordinator, type_name, request).await?))
}

async fn insert(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ChangeRecord>)> {
    let record =
        handle_record_write(state.coordinator, type_name, id, RecordWrite::Insert).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn upsert(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<Json<ChangeRecord>> {
    let record =
        handle_record_write(state.coordinator, type_name, id, RecordWrite::Upsert).await?;
    Ok(Json(record))
}

async fn update(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<Json<ChangeRecord>> {
    let record =
        handle_record_write(state.coordinator, type_name, id, RecordWrite::Update).await?;
    Ok(Json(record))
}

async fn remove(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<Json<ChangeRecord>> {
    let record =
        handle_record_write(state.coordinator, type_name, id, RecordWrite::Remove).await?;
    Ok(Json(record))
}

async fn find(
    State(state): State<AppState>,
    Path((type_name, id)): Path<(String, String)>,
) -> Result<Json<ChangeRecord>> {
    Ok(Json(handle_find(state.coordinator, type_name, id).await?))
}

async fn get_syndex(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
) -> Result<Json<SyndexBody>> {
    Ok(Json(handle_get_syndex(state.coordinator, type_name).await?))
}

/// PUT /types/{type}/syndex - Move the counter forward.
async fn set_syndex(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
    body: std::result::Result<Json<SyndexBody>, JsonRejection>,
) -> Result<Json<SyndexBody>> {
    let Json(body) = body?;
    Ok(Json(
        handle_set_syndex(state.coordinator, type_name, body).await?,
    ))
}

async fn bump_syndex(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
) -> Result<Json<SyndexBody>> {
    Ok(Json(handle_bump_syndex(state.coordinator, type_name).await?))
}

/// GET /types/{type}/changes?since=n - Ids changed above `since`.
async fn changes(
    State(state): State<AppState>,
    Path(type_name): Path<String>,
    query: std::result::Result<Query<ChangesQuery>, QueryRejection>,
) -> Result<Json<Changes>> {
    let Query(query) = query?;
    Ok(Json(handle_changes(state.coordinator, type_name, query).await?))
}
