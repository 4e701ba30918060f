//! Store - the substrate the ledger composes into counters and change logs.
//!
//! A [`Store`] holds, per type, a monotonic counter and an append-only list of
//! change records. The [`Ledger`](crate::Ledger) owns the rules (what may be
//! marked, when a counter may move); the store only guarantees that counter
//! mutation is atomic per type and that records come back in syndex order.

use crate::{
    error::Result, ChangeOp, ChangeRecord, Error, LedgerSnapshot, Syndex, TypeInfo, TypeName,
    TypeSnapshot,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};

/// Capability set every ledger backend provides.
///
/// All methods take `&self`: implementations synchronize internally and must
/// be safe to call concurrently. Operations on distinct types must not
/// contend on a global lock; counter mutation for one type must be atomic.
pub trait Store: Send + Sync {
    /// Create a type with counter 0. Fails with `AlreadyExists`.
    fn register(&self, type_name: &str) -> Result<TypeInfo>;

    /// Current info for a type, `None` if it was never registered.
    fn type_info(&self, type_name: &str) -> Result<Option<TypeInfo>>;

    /// Names of all registered types.
    fn type_names(&self) -> Result<BTreeSet<TypeName>>;

    fn get_counter(&self, type_name: &str) -> Result<Syndex>;

    /// Move the counter forward. Fails with `RewindRejected` if `value` is
    /// below the current counter.
    fn set_counter(&self, type_name: &str, value: Syndex) -> Result<Syndex>;

    /// Atomically add one to the counter and return the new value.
    fn increment_counter(&self, type_name: &str) -> Result<Syndex>;

    /// Append a record. Never overwrites earlier records for the same id.
    fn append_record(&self, type_name: &str, record: ChangeRecord) -> Result<()>;

    /// Bump the counter and append a record carrying the new value.
    ///
    /// Backends that can do both under one lock (or one write) should
    /// override this.
    fn record_change(
        &self,
        type_name: &str,
        id: &str,
        op: Option<ChangeOp>,
    ) -> Result<ChangeRecord> {
        let syndex = self.increment_counter(type_name)?;
        let record = ChangeRecord::new(id, syndex, op);
        self.append_record(type_name, record.clone())?;
        Ok(record)
    }

    /// The highest-syndex record for `id`, if any.
    fn latest(&self, type_name: &str, id: &str) -> Result<Option<ChangeRecord>>;

    /// All records with `syndex > above`, ascending.
    fn records_above(&self, type_name: &str, above: Syndex) -> Result<Vec<ChangeRecord>>;

    /// Remove every type and record.
    fn flush_all(&self) -> Result<()>;
}

/// Counter and change log of a single type.
#[derive(Debug, Clone, Default)]
struct TypeLog {
    counter: Syndex,
    /// Kept in ascending syndex order
    records: Vec<ChangeRecord>,
    /// Latest record per id
    latest: HashMap<String, ChangeRecord>,
}

impl TypeLog {
    fn from_snapshot(snapshot: TypeSnapshot) -> Self {
        let mut log = TypeLog {
            counter: snapshot.counter,
            records: Vec::with_capacity(snapshot.records.len()),
            latest: HashMap::new(),
        };
        for record in snapshot.records {
            log.push(record);
        }
        log
    }

    fn to_snapshot(&self) -> TypeSnapshot {
        TypeSnapshot {
            counter: self.counter,
            records: self.records.clone(),
        }
    }

    fn info(&self, name: &str) -> TypeInfo {
        TypeInfo {
            name: name.to_string(),
            syndex: self.counter,
        }
    }

    fn bump(&mut self, type_name: &str) -> Result<Syndex> {
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| Error::Store(format!("syndex overflow for type {type_name}")))?;
        Ok(self.counter)
    }

    fn push(&mut self, record: ChangeRecord) {
        match self.latest.get(&record.id) {
            Some(current) if current.syndex > record.syndex => {}
            _ => {
                self.latest.insert(record.id.clone(), record.clone());
            }
        }

        let in_order = self
            .records
            .last()
            .map_or(true, |last| last.syndex <= record.syndex);
        if in_order {
            self.records.push(record);
        } else {
            let at = self.records.partition_point(|r| r.syndex <= record.syndex);
            self.records.insert(at, record);
        }
    }

    fn append(&mut self, type_name: &str, record: ChangeRecord) -> Result<()> {
        if record.syndex > self.counter {
            return Err(Error::Store(format!(
                "record syndex {} is ahead of counter {} for type {}",
                record.syndex, self.counter, type_name
            )));
        }
        self.push(record);
        Ok(())
    }

    fn above(&self, syndex: Syndex) -> Vec<ChangeRecord> {
        let start = self.records.partition_point(|r| r.syndex <= syndex);
        self.records[start..].to_vec()
    }
}

/// In-memory store.
///
/// Types live in a [`DashMap`], so mutating one type only locks that type's
/// shard and unrelated types proceed in parallel.
#[derive(Debug, Default)]
pub struct MemoryStore {
    types: DashMap<TypeName, TypeLog>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let types = DashMap::new();
        for (name, type_snapshot) in snapshot.types {
            types.insert(name, TypeLog::from_snapshot(type_snapshot));
        }
        Self { types }
    }

    /// Point-in-time copy of every type.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let types = self
            .types
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().to_snapshot()))
            .collect();
        LedgerSnapshot { types }
    }

    /// Replace the whole contents with a snapshot.
    pub fn restore(&self, snapshot: LedgerSnapshot) {
        self.types.clear();
        for (name, type_snapshot) in snapshot.types {
            self.types.insert(name, TypeLog::from_snapshot(type_snapshot));
        }
    }

    /// Copy of one type's state, `None` if it is not registered.
    pub fn type_snapshot(&self, type_name: &str) -> Option<TypeSnapshot> {
        self.types.get(type_name).map(|log| log.to_snapshot())
    }

    /// Put one type back to a state taken with [`type_snapshot`](Self::type_snapshot).
    pub fn restore_type(&self, type_name: &str, snapshot: Option<TypeSnapshot>) {
        match snapshot {
            Some(snapshot) => {
                self.types
                    .insert(type_name.to_string(), TypeLog::from_snapshot(snapshot));
            }
            None => {
                self.types.remove(type_name);
            }
        }
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn unknown(type_name: &str) -> Error {
        Error::UnknownType(type_name.to_string())
    }
}

impl Store for MemoryStore {
    fn register(&self, type_name: &str) -> Result<TypeInfo> {
        match self.types.entry(type_name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(type_name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(TypeLog::default());
                Ok(TypeInfo::new(type_name))
            }
        }
    }

    fn type_info(&self, type_name: &str) -> Result<Option<TypeInfo>> {
        Ok(self.types.get(type_name).map(|log| log.info(type_name)))
    }

    fn type_names(&self) -> Result<BTreeSet<TypeName>> {
        Ok(self.types.iter().map(|entry| entry.key().clone()).collect())
    }

    fn get_counter(&self, type_name: &str) -> Result<Syndex> {
        self.types
            .get(type_name)
            .map(|log| log.counter)
            .ok_or_else(|| Self::unknown(type_name))
    }

    fn set_counter(&self, type_name: &str, value: Syndex) -> Result<Syndex> {
        let mut log = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Self::unknown(type_name))?;
        if value < log.counter {
            return Err(Error::RewindRejected {
                current: log.counter,
                requested: value,
            });
        }
        log.counter = value;
        Ok(value)
    }

    fn increment_counter(&self, type_name: &str) -> Result<Syndex> {
        let mut log = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Self::unknown(type_name))?;
        log.bump(type_name)
    }

    fn append_record(&self, type_name: &str, record: ChangeRecord) -> Result<()> {
        let mut log = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Self::unknown(type_name))?;
        log.append(type_name, record)
    }

    fn record_change(
        &self,
        type_name: &str,
        id: &str,
        op: Option<ChangeOp>,
    ) -> Result<ChangeRecord> {
        let mut log = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| Self::unknown(type_name))?;
        let syndex = log.bump(type_name)?;
        let record = ChangeRecord::new(id, syndex, op);
        log.push(record.clone());
        Ok(record)
    }

    fn latest(&self, type_name: &str, id: &str) -> Result<Option<ChangeRecord>> {
        let log = self
            .types
            .get(type_name)
            .ok_or_else(|| Self::unknown(type_name))?;
        Ok(log.latest.get(id).cloned())
    }

    fn records_above(&self, type_name: &str, above: Syndex) -> Result<Vec<ChangeRecord>> {
        let log = self
            .types
            .get(type_name)
            .ok_or_else(|| Self::unknown(type_name))?;
        Ok(log.above(above))
    }

    fn flush_all(&self) -> Result<()> {
        self.types.clear();
        Ok(())
    }
}
