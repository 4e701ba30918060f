//! HTTP route definitions.

mod health;
mod subscribers;
mod types;
mod ws;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(types::routes())
        .merge(subscribers::routes())
        .merge(ws::routes())
}
