//! Sync coordinator - the subscriber-facing polling primitive.
//!
//! One `sync` call reads the subscriber's checkpoint, collects every change
//! above it and advances the checkpoint to the counter returned with those
//! changes. Calls for the same `(subscriber, type)` pair are serialized so a
//! checkpoint advance can never be lost or a range delivered twice relative
//! to the stored checkpoint.

use crate::locks::{lock, read, write, KeyedLocks};
use crate::{error::Result, sanitize, Changes, CheckpointTracker, Ledger, Syndex, TypeName};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Ties the ledger and the checkpoint tracker together.
pub struct SyncCoordinator {
    ledger: Arc<Ledger>,
    checkpoints: CheckpointTracker,
    pair_locks: KeyedLocks<(String, TypeName)>,
    gate: RwLock<()>,
}

impl SyncCoordinator {
    pub fn new(ledger: Arc<Ledger>, checkpoints: CheckpointTracker) -> Self {
        Self {
            ledger,
            checkpoints,
            pair_locks: KeyedLocks::new(),
            gate: RwLock::new(()),
        }
    }

    /// Coordinator over an in-memory ledger and in-memory checkpoints.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(Ledger::in_memory()), CheckpointTracker::in_memory())
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn checkpoints(&self) -> &CheckpointTracker {
        &self.checkpoints
    }

    /// Changes for `type_name` since `name` last synced.
    ///
    /// `reset` overrides the stored checkpoint for this call (replay from an
    /// explicit syndex). The stored checkpoint always ends up at the counter
    /// returned in [`Changes::syndex`].
    pub fn sync(&self, name: &str, type_name: &str, reset: Option<Syndex>) -> Result<Changes> {
        let name = sanitize::require("name", name)?;
        let type_name = sanitize::require("type", type_name)?;

        let _gate = read(&self.gate);
        let pair_lock = self.pair_locks.get(&(name.clone(), type_name.clone()));
        let _guard = lock(&pair_lock);

        self.ledger.register_if_missing(&type_name)?;

        let base = match reset {
            Some(syndex) => syndex,
            None => self.checkpoints.get_checkpoint(&name, &type_name)?,
        };
        let changes = self.ledger.above_syndex(&type_name, base)?;
        self.checkpoints
            .set_checkpoint(&name, &type_name, changes.syndex)?;

        tracing::debug!(
            subscriber = %name,
            type_name = %type_name,
            from = base,
            to = changes.syndex,
            count = changes.ids.len(),
            "Synced"
        );

        Ok(changes)
    }

    /// Stored checkpoint of `name` for `type_name`, 0 if never synced.
    pub fn checkpoint(&self, name: &str, type_name: &str) -> Result<Syndex> {
        let _gate = read(&self.gate);
        self.checkpoints.get_checkpoint(name, type_name)
    }

    /// All checkpoints of `name`.
    pub fn list_checkpoints(&self, name: &str) -> Result<BTreeMap<TypeName, Syndex>> {
        let _gate = read(&self.gate);
        self.checkpoints.checkpoints(name)
    }

    /// Overwrite a checkpoint, e.g. to rewind a subscriber and replay history.
    pub fn set_checkpoint(&self, name: &str, type_name: &str, syndex: Syndex) -> Result<()> {
        let name = sanitize::require("name", name)?;
        let type_name = sanitize::require("type", type_name)?;

        let _gate = read(&self.gate);
        let pair_lock = self.pair_locks.get(&(name.clone(), type_name.clone()));
        let _guard = lock(&pair_lock);
        self.checkpoints.set_checkpoint(&name, &type_name, syndex)
    }

    /// Drop every checkpoint of `name`; its next sync starts from 0.
    pub fn flush(&self, name: &str) -> Result<()> {
        let name = sanitize::require("name", name)?;

        let _gate = write(&self.gate);
        self.checkpoints.flush(&name)?;
        self.pair_locks.retain(|(subscriber, _), _| subscriber != &name);
        tracing::info!(subscriber = %name, "Flushed subscriber checkpoints");
        Ok(())
    }

    /// Flush the ledger and every subscriber's checkpoints.
    ///
    /// Checkpoints would otherwise point past the counters of the emptied
    /// ledger and hide the first changes marked after the flush.
    pub fn reset(&self) -> Result<()> {
        let _gate = write(&self.gate);
        self.ledger.flush()?;
        self.checkpoints.clear()?;
        self.pair_locks.clear();
        tracing::info!("Ledger and checkpoints reset");
        Ok(())
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}
