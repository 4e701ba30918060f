//! Master-side handlers: type registration, change marking and range queries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use syndex_engine::{ChangeRecord, Changes, Syndex, SyncCoordinator, TypeInfo};

use super::blocking;
use crate::error::Result;

/// Body of `POST /types/{type}/mark`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MarkRequest {
    Many { ids: Vec<String> },
    One { id: String },
}

/// Records written by a mark, with the counter after the write.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub records: Vec<ChangeRecord>,
    pub syndex: Syndex,
}

#[derive(Debug, Serialize)]
pub struct TypesResponse {
    pub types: Vec<TypeInfo>,
}

/// Counter value, used both as request and response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyndexBody {
    pub syndex: Syndex,
}

/// Query parameters for `GET /types/{type}/changes`.
#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    pub since: Syndex,
}

/// All registered types with their counters.
pub async fn handle_list_types(coordinator: Arc<SyncCoordinator>) -> Result<TypesResponse> {
    blocking(move || {
        let ledger = coordinator.ledger();
        let mut types = Vec::new();
        for name in ledger.types()? {
            match ledger.type_info(&name) {
                Ok(info) => types.push(info),
                // Flushed between listing and lookup
                Err(syndex_engine::Error::UnknownType(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(TypesResponse { types })
    })
    .await
}

pub async fn handle_register(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
) -> Result<TypeInfo> {
    blocking(move || coordinator.ledger().register(&type_name)).await
}

pub async fn handle_type_info(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
) -> Result<TypeInfo> {
    blocking(move || coordinator.ledger().type_info(&type_name)).await
}

/// Global flush: every type, record and checkpoint.
pub async fn handle_reset(coordinator: Arc<SyncCoordinator>) -> Result<()> {
    blocking(move || coordinator.reset()).await
}

pub async fn handle_mark(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
    request: MarkRequest,
) -> Result<MarkResponse> {
    blocking(move || {
        let ledger = coordinator.ledger();
        let records = match request {
            MarkRequest::One { id } => vec![ledger.mark(&type_name, &id)?],
            MarkRequest::Many { ids } => ledger.mark_many(&type_name, ids.as_slice())?,
        };
        let syndex = records.last().map_or(0, |record| record.syndex);
        Ok(MarkResponse { records, syndex })
    })
    .await
}

/// Apply a classified write to a single record.
pub async fn handle_record_write(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
    id: String,
    op: RecordWrite,
) -> Result<ChangeRecord> {
    blocking(move || {
        let ledger = coordinator.ledger();
        match op {
            RecordWrite::Insert => ledger.insert(&type_name, &id),
            RecordWrite::Upsert => ledger.upsert(&type_name, &id),
            RecordWrite::Update => ledger.update(&type_name, &id),
            RecordWrite::Remove => ledger.remove(&type_name, &id),
        }
    })
    .await
}

/// Write operations exposed on `/types/{type}/records/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordWrite {
    Insert,
    Upsert,
    Update,
    Remove,
}

/// Latest record for `id`; a miss is reported as `NotFound`.
pub async fn handle_find(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
    id: String,
) -> Result<ChangeRecord> {
    blocking(move || {
        coordinator
            .ledger()
            .find(&type_name, &id)?
            .ok_or_else(|| syndex_engine::Error::NotFound {
                type_name: syndex_engine::sanitize(&type_name),
                id: syndex_engine::sanitize(&id),
            })
    })
    .await
}

pub async fn handle_get_syndex(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
) -> Result<SyndexBody> {
    blocking(move || {
        let syndex = coordinator.ledger().get_syndex(&type_name)?;
        Ok(SyndexBody { syndex })
    })
    .await
}

pub async fn handle_set_syndex(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
    body: SyndexBody,
) -> Result<SyndexBody> {
    blocking(move || {
        let syndex = coordinator.ledger().set_syndex(&type_name, body.syndex)?;
        Ok(SyndexBody { syndex })
    })
    .await
}

pub async fn handle_bump_syndex(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
) -> Result<SyndexBody> {
    blocking(move || {
        let syndex = coordinator.ledger().bump_syndex(&type_name)?;
        Ok(SyndexBody { syndex })
    })
    .await
}

pub async fn handle_changes(
    coordinator: Arc<SyncCoordinator>,
    type_name: String,
    query: ChangesQuery,
) -> Result<Changes> {
    blocking(move || coordinator.ledger().above_syndex(&type_name, query.since)).await
}
