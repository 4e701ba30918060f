//! Lock helpers shared by the ledger, the coordinator and the file stores.
//!
//! The guarded data is either `()` or state that is fully written before any
//! code that could panic runs, so a poisoned lock is recovered rather than
//! propagated.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

/// One mutex per key, created on first use.
#[derive(Debug)]
pub(crate) struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// The mutex for `key`. The map's shard lock is released before the
    /// caller locks the returned mutex.
    pub(crate) fn get(&self, key: &K) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.locks.entry(key.clone()).or_default().value())
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }

    /// Drop every mutex. Only call while no key lock can be held.
    pub(crate) fn clear(&self) {
        self.locks.clear();
    }

    pub(crate) fn retain(&self, keep: impl FnMut(&K, &mut Arc<Mutex<()>>) -> bool) {
        self.locks.retain(keep);
    }
}
