//! Syndex Server - master node for the syndex change ledger.
//!
//! Writers mark changed ids over HTTP; subscribers poll for everything that
//! changed since their last sync, over HTTP or a WebSocket that also pushes a
//! notification after every write.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod websocket;

use crate::config::{Backend, Config};
use crate::websocket::{ConnectionManager, ServerMessage};
use axum::Router;
use std::sync::Arc;
use syndex_engine::{
    CheckpointStore, CheckpointTracker, JsonCheckpoints, JsonStore, Ledger, MarkEvent,
    MemoryCheckpoints, MemoryStore, Store, SyncCoordinator,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SyncCoordinator>,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
}

impl AppState {
    /// Open the configured backend and wire ledger writes to the socket broadcast.
    pub fn build(config: Config) -> syndex_engine::error::Result<Self> {
        let (store, checkpoints): (Arc<dyn Store>, Arc<dyn CheckpointStore>) = match config.backend
        {
            Backend::Memory => (
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryCheckpoints::new()),
            ),
            Backend::Json => (
                Arc::new(JsonStore::open(config.ledger_path())?),
                Arc::new(JsonCheckpoints::open(config.checkpoints_path())?),
            ),
        };

        let conn_manager = ConnectionManager::new_shared();
        let notifier = Arc::clone(&conn_manager);
        let ledger = Ledger::new(store).with_listener(Arc::new(move |event: &MarkEvent| {
            notifier.broadcast_all(ServerMessage::from(event));
        }));

        let coordinator = SyncCoordinator::new(Arc::new(ledger), CheckpointTracker::new(checkpoints));

        Ok(Self {
            coordinator: Arc::new(coordinator),
            config: Arc::new(config),
            conn_manager,
        })
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
