//! Ledger - type lifecycle, change marking and range queries.
//!
//! The ledger is the master's view of the world: for every registered type it
//! owns a monotonic counter (the syndex) and an append-only list of change
//! records. Writers mark ids as changed; subscribers ask for everything above
//! the syndex they last saw.
//!
//! Every write for a type runs under that type's mutex, so the
//! check → bump → append sequence of `insert`/`update`/`remove` can never
//! interleave with another write to the same type. Different types never
//! share a lock. `flush` takes the ledger-wide gate exclusively and therefore
//! waits for all in-flight operations. A type lock only ever exists for a
//! registered type; operations that need an existing type check for it before
//! a lock is created.

use crate::locks::{lock, read, write, KeyedLocks};
use crate::store::{MemoryStore, Store};
use crate::{
    error::Result, sanitize, ChangeOp, ChangeRecord, Changes, Error, Syndex, TypeInfo, TypeName,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Emitted after every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEvent {
    pub type_name: TypeName,
    /// Records written by the call, in syndex order
    pub records: Vec<ChangeRecord>,
    /// Counter after the write
    pub syndex: Syndex,
}

/// Callback invoked with every [`MarkEvent`].
///
/// Listeners run while the type lock is held, so events of one type arrive in
/// syndex order. A listener must not call back into the ledger.
pub type MarkListener = Arc<dyn Fn(&MarkEvent) + Send + Sync>;

/// The change ledger.
pub struct Ledger {
    store: Arc<dyn Store>,
    type_locks: KeyedLocks<TypeName>,
    gate: RwLock<()>,
    listener: Option<MarkListener>,
}

impl Ledger {
    /// Create a ledger over `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            type_locks: KeyedLocks::new(),
            gate: RwLock::new(()),
            listener: None,
        }
    }

    /// Create a ledger over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Install a listener called after each successful write.
    pub fn with_listener(mut self, listener: MarkListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Register a new type. Fails with `AlreadyExists`.
    pub fn register(&self, type_name: &str) -> Result<TypeInfo> {
        let type_name = sanitize::require("type", type_name)?;
        let _gate = read(&self.gate);
        let info = self.store.register(&type_name)?;
        tracing::debug!(type_name = %type_name, "Registered type");
        Ok(info)
    }

    /// Register `type_name` unless it exists; never resets an existing counter.
    pub fn register_if_missing(&self, type_name: &str) -> Result<TypeInfo> {
        let type_name = sanitize::require("type", type_name)?;
        let _gate = read(&self.gate);
        self.ensure_registered(&type_name)
    }

    /// Names of all registered types.
    pub fn types(&self) -> Result<BTreeSet<TypeName>> {
        let _gate = read(&self.gate);
        self.store.type_names()
    }

    /// Info for a registered type. Fails with `UnknownType`.
    pub fn type_info(&self, type_name: &str) -> Result<TypeInfo> {
        let type_name = sanitize::require("type", type_name)?;
        let _gate = read(&self.gate);
        self.require_type(&type_name)
    }

    /// Mark `id` as changed, registering the type if needed.
    pub fn mark(&self, type_name: &str, id: &str) -> Result<ChangeRecord> {
        let type_name = sanitize::require("type", type_name)?;
        let id = sanitize::require("id", id)?;

        let record = self.with_type_lock(&type_name, || {
            self.ensure_registered(&type_name)?;
            let record = self.store.record_change(&type_name, &id, None)?;
            self.emit(&type_name, std::slice::from_ref(&record));
            Ok(record)
        })?;

        tracing::debug!(type_name = %type_name, id = %record.id, syndex = record.syndex, "Marked change");
        Ok(record)
    }

    /// Mark a batch of ids.
    ///
    /// Every id gets its own syndex; the batch holds the type lock throughout,
    /// so the syndexes are consecutive. All ids are validated before anything
    /// is written. A store failure part-way through returns the error and
    /// leaves the records already written in place.
    pub fn mark_many<S: AsRef<str>>(&self, type_name: &str, ids: &[S]) -> Result<Vec<ChangeRecord>> {
        let type_name = sanitize::require("type", type_name)?;
        if ids.is_empty() {
            return Err(Error::required("id"));
        }
        let ids = ids
            .iter()
            .map(|id| sanitize::require("id", id.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let records = self.with_type_lock(&type_name, || {
            self.ensure_registered(&type_name)?;
            let records = ids
                .iter()
                .map(|id| self.store.record_change(&type_name, id, None))
                .collect::<Result<Vec<_>>>()?;
            self.emit(&type_name, &records);
            Ok(records)
        })?;

        tracing::debug!(type_name = %type_name, count = records.len(), "Marked batch");
        Ok(records)
    }

    /// Record the creation of `id`. Fails with `DuplicateId` if `id` has any
    /// earlier record, including a removal.
    pub fn insert(&self, type_name: &str, id: &str) -> Result<ChangeRecord> {
        let type_name = sanitize::require("type", type_name)?;
        let id = sanitize::require("id", id)?;

        self.with_type_lock(&type_name, || {
            self.ensure_registered(&type_name)?;
            if self.store.latest(&type_name, &id)?.is_some() {
                return Err(Error::DuplicateId {
                    type_name: type_name.clone(),
                    id: id.clone(),
                });
            }
            let record = self
                .store
                .record_change(&type_name, &id, Some(ChangeOp::Insert))?;
            self.emit(&type_name, std::slice::from_ref(&record));
            Ok(record)
        })
    }

    /// Record a change to an existing `id`.
    pub fn update(&self, type_name: &str, id: &str) -> Result<ChangeRecord> {
        self.change_existing(type_name, id, ChangeOp::Update)
    }

    /// Update `id` if it has a record, insert it otherwise.
    pub fn upsert(&self, type_name: &str, id: &str) -> Result<ChangeRecord> {
        let type_name = sanitize::require("type", type_name)?;
        let id = sanitize::require("id", id)?;

        self.with_type_lock(&type_name, || {
            self.ensure_registered(&type_name)?;
            let op = match self.store.latest(&type_name, &id)? {
                Some(_) => ChangeOp::Update,
                None => ChangeOp::Insert,
            };
            let record = self.store.record_change(&type_name, &id, Some(op))?;
            self.emit(&type_name, std::slice::from_ref(&record));
            Ok(record)
        })
    }

    /// Append a removal tombstone for `id`. The id stays visible to `find`.
    pub fn remove(&self, type_name: &str, id: &str) -> Result<ChangeRecord> {
        self.change_existing(type_name, id, ChangeOp::Remove)
    }

    /// The most recent record for `id`. Unknown types yield `None`.
    pub fn find(&self, type_name: &str, id: &str) -> Result<Option<ChangeRecord>> {
        let type_name = sanitize::require("type", type_name)?;
        let id = sanitize::require("id", id)?;
        let _gate = read(&self.gate);
        match self.store.latest(&type_name, &id) {
            Err(Error::UnknownType(_)) => Ok(None),
            other => other,
        }
    }

    /// Current counter of a type. Fails with `UnknownType`.
    pub fn get_syndex(&self, type_name: &str) -> Result<Syndex> {
        let type_name = sanitize::require("type", type_name)?;
        let _gate = read(&self.gate);
        self.store.get_counter(&type_name)
    }

    /// Syndex of the latest change to `id`, `None` if it never changed.
    pub fn syndex_of(&self, type_name: &str, id: &str) -> Result<Option<Syndex>> {
        Ok(self.find(type_name, id)?.map(|record| record.syndex))
    }

    /// Move the counter to `value`. Fails with `RewindRejected` when `value`
    /// is below the current counter.
    pub fn set_syndex(&self, type_name: &str, value: Syndex) -> Result<Syndex> {
        let type_name = sanitize::require("type", type_name)?;

        self.with_existing_type_lock(&type_name, || {
            let current = self.store.get_counter(&type_name)?;
            if value < current {
                tracing::warn!(type_name = %type_name, current, requested = value, "Rejected syndex rewind");
                return Err(Error::RewindRejected {
                    current,
                    requested: value,
                });
            }
            self.store.set_counter(&type_name, value)
        })
    }

    /// Advance the counter by one without recording a change.
    pub fn bump_syndex(&self, type_name: &str) -> Result<Syndex> {
        let type_name = sanitize::require("type", type_name)?;
        self.with_existing_type_lock(&type_name, || self.store.increment_counter(&type_name))
    }

    /// Ids changed above `syndex`, in syndex order, with the current counter.
    ///
    /// Unknown types yield no ids and a counter of 0.
    pub fn above_syndex(&self, type_name: &str, syndex: Syndex) -> Result<Changes> {
        let type_name = sanitize::require("type", type_name)?;

        // Read under the type lock so the counter matches the records returned
        let changes = self.with_existing_type_lock(&type_name, || {
            let counter = self.store.get_counter(&type_name)?;
            let ids = self
                .store
                .records_above(&type_name, syndex)?
                .into_iter()
                .map(|record| record.id)
                .collect();
            Ok(Changes {
                ids,
                syndex: counter,
            })
        });
        match changes {
            Err(Error::UnknownType(_)) => Ok(Changes::empty()),
            other => other,
        }
    }

    /// Delete every type and record.
    pub fn flush(&self) -> Result<()> {
        let _gate = write(&self.gate);
        self.store.flush_all()?;
        self.type_locks.clear();
        tracing::info!("Ledger flushed");
        Ok(())
    }

    fn change_existing(&self, type_name: &str, id: &str, op: ChangeOp) -> Result<ChangeRecord> {
        let type_name = sanitize::require("type", type_name)?;
        let id = sanitize::require("id", id)?;

        self.with_existing_type_lock(&type_name, || {
            if self.store.latest(&type_name, &id)?.is_none() {
                return Err(Error::NotFound {
                    type_name: type_name.clone(),
                    id: id.clone(),
                });
            }
            let record = self.store.record_change(&type_name, &id, Some(op))?;
            self.emit(&type_name, std::slice::from_ref(&record));
            Ok(record)
        })
    }

    /// Run `f` under the type lock. `f` registers the type if it is missing.
    fn with_type_lock<T>(&self, type_name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _gate = read(&self.gate);
        let type_lock = self.type_locks.get(&type_name.to_string());
        let _guard = lock(&type_lock);
        f()
    }

    /// Run `f` under the type lock, failing with `UnknownType` before any
    /// lock exists for an unregistered type.
    fn with_existing_type_lock<T>(
        &self,
        type_name: &str,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let _gate = read(&self.gate);
        self.require_type(type_name)?;
        let type_lock = self.type_locks.get(&type_name.to_string());
        let _guard = lock(&type_lock);
        f()
    }

    fn require_type(&self, type_name: &str) -> Result<TypeInfo> {
        self.store
            .type_info(type_name)?
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }

    fn ensure_registered(&self, type_name: &str) -> Result<TypeInfo> {
        if let Some(info) = self.store.type_info(type_name)? {
            return Ok(info);
        }
        match self.store.register(type_name) {
            Ok(info) => {
                tracing::debug!(type_name = %type_name, "Registered type on first use");
                Ok(info)
            }
            // Lost a race with another registration
            Err(Error::AlreadyExists(_)) => self.require_type(type_name),
            Err(e) => Err(e),
        }
    }

    fn emit(&self, type_name: &str, records: &[ChangeRecord]) {
        let (Some(listener), Some(last)) = (&self.listener, records.last()) else {
            return;
        };
        listener(&MarkEvent {
            type_name: type_name.to_string(),
            records: records.to_vec(),
            syndex: last.syndex,
        });
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("has_listener", &self.listener.is_some())
            .field("locked_types", &self.type_locks.len())
            .finish_non_exhaustive()
    }
}
