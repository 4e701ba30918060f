//! Subscriber-side handlers: sync and checkpoint management.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use syndex_engine::{Changes, Syndex, SyncCoordinator, TypeName};

use super::blocking;
use crate::error::Result;

/// Body of `POST /subscribers/{name}/sync`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Replay from this syndex instead of the stored checkpoint
    #[serde(default)]
    pub reset_syndex: Option<Syndex>,
}

#[derive(Debug, Serialize)]
pub struct CheckpointsResponse {
    pub checkpoints: BTreeMap<TypeName, Syndex>,
}

/// Process a sync request from a subscriber.
pub async fn handle_sync(
    coordinator: Arc<SyncCoordinator>,
    name: String,
    request: SyncRequest,
) -> Result<Changes> {
    blocking(move || coordinator.sync(&name, &request.type_name, request.reset_syndex)).await
}

pub async fn handle_list_checkpoints(
    coordinator: Arc<SyncCoordinator>,
    name: String,
) -> Result<CheckpointsResponse> {
    blocking(move || {
        let checkpoints = coordinator.list_checkpoints(&name)?;
        Ok(CheckpointsResponse { checkpoints })
    })
    .await
}

pub async fn handle_set_checkpoint(
    coordinator: Arc<SyncCoordinator>,
    name: String,
    type_name: String,
    syndex: Syndex,
) -> Result<()> {
    blocking(move || coordinator.set_checkpoint(&name, &type_name, syndex)).await
}

/// Forget a subscriber; its next sync starts from 0.
pub async fn handle_flush(coordinator: Arc<SyncCoordinator>, name: String) -> Result<()> {
    blocking(move || coordinator.flush(&name)).await
}
