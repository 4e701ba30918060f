//! File-backed stores.
//!
//! Both stores keep their state in memory and rewrite a single JSON file after
//! every mutation (write to a temporary file, then rename). A mutation only
//! counts once the file is written: when the write fails, the in-memory state
//! is rolled back and the caller gets the `Store` error. Reads never touch the
//! disk.

use crate::checkpoint::{CheckpointStore, MemoryCheckpoints};
use crate::locks::lock;
use crate::store::{MemoryStore, Store};
use crate::{
    error::Result, ChangeOp, ChangeRecord, CheckpointSnapshot, LedgerSnapshot, Syndex, TypeInfo,
    TypeName,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Read `path`, `None` if it does not exist.
fn read_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` with `contents` via a sibling temporary file.
fn write_file(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Ledger store persisted as one JSON snapshot file.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Serializes mutate+write so the file always reflects the latest state
    save_lock: Mutex<()>,
}

impl JsonStore {
    /// Open the store at `path`, loading it if the file exists.
    ///
    /// Missing parent directories are created; a missing file is an empty
    /// ledger and is written on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_parent(&path)?;

        let inner = match read_file(&path)? {
            Some(json) => MemoryStore::from_snapshot(LedgerSnapshot::from_json(&json)?),
            None => MemoryStore::new(),
        };

        tracing::debug!(path = %path.display(), types = inner.len(), "Opened JSON ledger store");

        Ok(Self {
            path,
            inner,
            save_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.snapshot()
    }

    /// Write the current state to disk.
    pub fn save(&self) -> Result<()> {
        let _guard = lock(&self.save_lock);
        self.write()
    }

    fn write(&self) -> Result<()> {
        let json = self.inner.snapshot().to_json()?;
        write_file(&self.path, &json)
    }

    /// Apply a mutation of `type_name` and persist it, restoring the type's
    /// previous state if the file cannot be written.
    fn commit_type<T>(
        &self,
        type_name: &str,
        apply: impl FnOnce(&MemoryStore) -> Result<T>,
    ) -> Result<T> {
        let _guard = lock(&self.save_lock);
        let previous = self.inner.type_snapshot(type_name);
        let value = apply(&self.inner)?;
        if let Err(e) = self.write() {
            self.inner.restore_type(type_name, previous);
            tracing::warn!(path = %self.path.display(), type_name = %type_name, "Ledger write failed, change rolled back: {}", e);
            return Err(e);
        }
        Ok(value)
    }
}

impl Store for JsonStore {
    fn register(&self, type_name: &str) -> Result<TypeInfo> {
        self.commit_type(type_name, |inner| inner.register(type_name))
    }

    fn type_info(&self, type_name: &str) -> Result<Option<TypeInfo>> {
        self.inner.type_info(type_name)
    }

    fn type_names(&self) -> Result<BTreeSet<TypeName>> {
        self.inner.type_names()
    }

    fn get_counter(&self, type_name: &str) -> Result<Syndex> {
        self.inner.get_counter(type_name)
    }

    fn set_counter(&self, type_name: &str, value: Syndex) -> Result<Syndex> {
        self.commit_type(type_name, |inner| inner.set_counter(type_name, value))
    }

    fn increment_counter(&self, type_name: &str) -> Result<Syndex> {
        self.commit_type(type_name, |inner| inner.increment_counter(type_name))
    }

    fn append_record(&self, type_name: &str, record: ChangeRecord) -> Result<()> {
        self.commit_type(type_name, |inner| inner.append_record(type_name, record))
    }

    fn record_change(
        &self,
        type_name: &str,
        id: &str,
        op: Option<ChangeOp>,
    ) -> Result<ChangeRecord> {
        self.commit_type(type_name, |inner| inner.record_change(type_name, id, op))
    }

    fn latest(&self, type_name: &str, id: &str) -> Result<Option<ChangeRecord>> {
        self.inner.latest(type_name, id)
    }

    fn records_above(&self, type_name: &str, above: Syndex) -> Result<Vec<ChangeRecord>> {
        self.inner.records_above(type_name, above)
    }

    fn flush_all(&self) -> Result<()> {
        let _guard = lock(&self.save_lock);
        let previous = self.inner.snapshot();
        self.inner.flush_all()?;
        if let Err(e) = self.write() {
            self.inner.restore(previous);
            tracing::warn!(path = %self.path.display(), "Ledger write failed, flush rolled back: {}", e);
            return Err(e);
        }
        Ok(())
    }
}

/// Subscriber checkpoints persisted as one JSON file.
#[derive(Debug)]
pub struct JsonCheckpoints {
    path: PathBuf,
    inner: MemoryCheckpoints,
    save_lock: Mutex<()>,
}

impl JsonCheckpoints {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_parent(&path)?;

        let inner = match read_file(&path)? {
            Some(json) => MemoryCheckpoints::from_snapshot(CheckpointSnapshot::from_json(&json)?),
            None => MemoryCheckpoints::new(),
        };

        Ok(Self {
            path,
            inner,
            save_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let _guard = lock(&self.save_lock);
        self.write()
    }

    fn write(&self) -> Result<()> {
        let json = self.inner.snapshot().to_json()?;
        write_file(&self.path, &json)
    }

    /// Apply a change to `name`'s checkpoints and persist it, restoring them
    /// if the file cannot be written.
    fn commit_subscriber(
        &self,
        name: &str,
        apply: impl FnOnce(&MemoryCheckpoints) -> Result<()>,
    ) -> Result<()> {
        let _guard = lock(&self.save_lock);
        let previous = self.inner.subscriber(name);
        apply(&self.inner)?;
        if let Err(e) = self.write() {
            self.inner.restore_subscriber(name, previous);
            tracing::warn!(path = %self.path.display(), subscriber = %name, "Checkpoint write failed, change rolled back: {}", e);
            return Err(e);
        }
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpoints {
    fn get(&self, name: &str, type_name: &str) -> Result<Option<Syndex>> {
        self.inner.get(name, type_name)
    }

    fn set(&self, name: &str, type_name: &str, syndex: Syndex) -> Result<()> {
        self.commit_subscriber(name, |inner| inner.set(name, type_name, syndex))
    }

    fn flush(&self, name: &str) -> Result<()> {
        self.commit_subscriber(name, |inner| inner.flush(name))
    }

    fn list(&self, name: &str) -> Result<BTreeMap<TypeName, Syndex>> {
        self.inner.list(name)
    }

    fn clear(&self) -> Result<()> {
        let _guard = lock(&self.save_lock);
        let previous = self.inner.snapshot();
        self.inner.clear()?;
        if let Err(e) = self.write() {
            self.inner.restore(previous);
            tracing::warn!(path = %self.path.display(), "Checkpoint write failed, clear rolled back: {}", e);
            return Err(e);
        }
        Ok(())
    }
}
