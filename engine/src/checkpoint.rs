//! Subscriber checkpoints: the last syndex each subscriber saw, per type.

use crate::{error::Result, sanitize, CheckpointSnapshot, Syndex, TypeName};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Backend for `(subscriber, type) -> last syndex`.
///
/// Checkpoints are not required to be monotonic here: a caller may rewind a
/// subscriber on purpose to replay history.
pub trait CheckpointStore: Send + Sync {
    /// Stored checkpoint, `None` if the pair was never seen.
    fn get(&self, name: &str, type_name: &str) -> Result<Option<Syndex>>;

    fn set(&self, name: &str, type_name: &str, syndex: Syndex) -> Result<()>;

    /// Drop every checkpoint of `name`.
    fn flush(&self, name: &str) -> Result<()>;

    /// All checkpoints of `name`.
    fn list(&self, name: &str) -> Result<BTreeMap<TypeName, Syndex>>;

    /// Drop every checkpoint of every subscriber.
    fn clear(&self) -> Result<()>;
}

/// In-memory checkpoints, one map entry per subscriber.
#[derive(Debug, Default)]
pub struct MemoryCheckpoints {
    subscribers: DashMap<String, BTreeMap<TypeName, Syndex>>,
}

impl MemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CheckpointSnapshot) -> Self {
        let subscribers = DashMap::new();
        for (name, types) in snapshot.subscribers {
            subscribers.insert(name, types);
        }
        Self { subscribers }
    }

    pub fn snapshot(&self) -> CheckpointSnapshot {
        let subscribers = self
            .subscribers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        CheckpointSnapshot { subscribers }
    }

    /// Replace the whole contents with a snapshot.
    pub fn restore(&self, snapshot: CheckpointSnapshot) {
        self.subscribers.clear();
        for (name, types) in snapshot.subscribers {
            self.subscribers.insert(name, types);
        }
    }

    /// Checkpoints of one subscriber, `None` if it has none.
    pub fn subscriber(&self, name: &str) -> Option<BTreeMap<TypeName, Syndex>> {
        self.subscribers.get(name).map(|types| types.clone())
    }

    pub fn restore_subscriber(&self, name: &str, types: Option<BTreeMap<TypeName, Syndex>>) {
        match types {
            Some(types) => {
                self.subscribers.insert(name.to_string(), types);
            }
            None => {
                self.subscribers.remove(name);
            }
        }
    }
}

impl CheckpointStore for MemoryCheckpoints {
    fn get(&self, name: &str, type_name: &str) -> Result<Option<Syndex>> {
        Ok(self
            .subscribers
            .get(name)
            .and_then(|types| types.get(type_name).copied()))
    }

    fn set(&self, name: &str, type_name: &str, syndex: Syndex) -> Result<()> {
        self.subscribers
            .entry(name.to_string())
            .or_default()
            .insert(type_name.to_string(), syndex);
        Ok(())
    }

    fn flush(&self, name: &str) -> Result<()> {
        self.subscribers.remove(name);
        Ok(())
    }

    fn list(&self, name: &str) -> Result<BTreeMap<TypeName, Syndex>> {
        Ok(self
            .subscribers
            .get(name)
            .map(|types| types.clone())
            .unwrap_or_default())
    }

    fn clear(&self) -> Result<()> {
        self.subscribers.clear();
        Ok(())
    }
}

/// Validating front for a [`CheckpointStore`].
///
/// Names and types are sanitized the same way the ledger sanitizes them, so a
/// subscriber's checkpoint for `"Order!"` and `"Order"` is the same entry.
#[derive(Clone)]
pub struct CheckpointTracker {
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointTracker {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Tracker over fresh in-memory checkpoints.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCheckpoints::new()))
    }

    /// Last syndex `name` observed for `type_name`, 0 if none.
    pub fn get_checkpoint(&self, name: &str, type_name: &str) -> Result<Syndex> {
        let name = sanitize::require("name", name)?;
        let type_name = sanitize::require("type", type_name)?;
        Ok(self.store.get(&name, &type_name)?.unwrap_or(0))
    }

    pub fn set_checkpoint(&self, name: &str, type_name: &str, syndex: Syndex) -> Result<()> {
        let name = sanitize::require("name", name)?;
        let type_name = sanitize::require("type", type_name)?;
        self.store.set(&name, &type_name, syndex)
    }

    /// Forget everything `name` has seen, forcing a full resync.
    pub fn flush(&self, name: &str) -> Result<()> {
        let name = sanitize::require("name", name)?;
        self.store.flush(&name)
    }

    pub fn checkpoints(&self, name: &str) -> Result<BTreeMap<TypeName, Syndex>> {
        let name = sanitize::require("name", name)?;
        self.store.list(&name)
    }

    /// Forget every subscriber.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}

impl std::fmt::Debug for CheckpointTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointTracker").finish_non_exhaustive()
    }
}
