//! Snapshot types for persisting and restoring ledger state.
//!
//! Snapshots are the bridge between the in-memory stores and persistent
//! storage. They use `BTreeMap` so serialization is deterministic: saving,
//! loading and saving again produces the same bytes.

use crate::{error::Result, ChangeRecord, Error, Syndex, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state of a single type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSnapshot {
    /// Counter value
    pub counter: Syndex,
    /// Change records in ascending syndex order
    pub records: Vec<ChangeRecord>,
}

/// Point-in-time state of the whole ledger.
///
/// Serializes as a plain mapping `type name -> {counter, records}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerSnapshot {
    pub types: BTreeMap<TypeName, TypeSnapshot>,
}

impl LedgerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total record count across all types.
    pub fn record_count(&self) -> usize {
        self.types.values().map(|t| t.records.len()).sum()
    }

    /// Check the structural invariants a loaded snapshot must satisfy:
    /// records strictly ascend by syndex and never exceed the type's counter.
    pub fn validate(&self) -> Result<()> {
        for (name, snapshot) in &self.types {
            let mut previous: Option<Syndex> = None;
            for record in &snapshot.records {
                if previous.is_some_and(|previous| record.syndex <= previous) {
                    return Err(Error::Store(format!(
                        "invalid snapshot: records of {name} are not in syndex order"
                    )));
                }
                if record.syndex > snapshot.counter {
                    return Err(Error::Store(format!(
                        "invalid snapshot: record {} of {name} is ahead of counter {}",
                        record.id, snapshot.counter
                    )));
                }
                previous = Some(record.syndex);
            }
        }
        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Store(e.to_string()))
    }

    /// Deserialize from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::Store(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Persisted subscriber checkpoints: `name -> type -> last syndex`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointSnapshot {
    pub subscribers: BTreeMap<String, BTreeMap<TypeName, Syndex>>,
}

impl CheckpointSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Store(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeOp;

    fn sample() -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::new();
        snapshot.types.insert(
            "User".into(),
            TypeSnapshot {
                counter: 3,
                records: vec![
                    ChangeRecord::new("u1", 1, Some(ChangeOp::Insert)),
                    ChangeRecord::new("u2", 2, None),
                    ChangeRecord::new("u1", 3, Some(ChangeOp::Remove)),
                ],
            },
        );
        snapshot
            .types
            .insert("Order".into(), TypeSnapshot::default());
        snapshot
    }

    #[test]
    fn layout_is_a_plain_mapping() {
        let json = sample().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"Order":{"counter":0,"records":[]},"User":{"counter":3,"records":[{"id":"u1","syndex":1,"op":"insert"},{"id":"u2","syndex":2},{"id":"u1","syndex":3,"op":"remove"}]}}"#
        );
    }

    #[test]
    fn json_roundtrip_is_byte_identical() {
        let json = sample().to_json().unwrap();
        let restored = LedgerSnapshot::from_json(&json).unwrap();
        assert_eq!(restored, sample());
        assert_eq!(restored.to_json().unwrap(), json);
        assert_eq!(restored.record_count(), 3);
    }

    #[test]
    fn reject_records_ahead_of_counter() {
        let json = r#"{"User":{"counter":1,"records":[{"id":"a","syndex":2}]}}"#;
        let result = LedgerSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn reject_unordered_records() {
        let json = r#"{"User":{"counter":5,"records":[{"id":"a","syndex":4},{"id":"b","syndex":2}]}}"#;
        let result = LedgerSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn reject_repeated_syndex() {
        let json = r#"{"User":{"counter":5,"records":[{"id":"a","syndex":3},{"id":"b","syndex":3}]}}"#;
        let result = LedgerSnapshot::from_json(json);
        assert!(matches!(result, Err(Error::Store(msg)) if msg.contains("syndex order")));
    }

    #[test]
    fn reject_garbage() {
        assert!(matches!(
            LedgerSnapshot::from_json("not json"),
            Err(Error::Store(_))
        ));
    }

    #[test]
    fn checkpoint_layout() {
        let mut snapshot = CheckpointSnapshot::default();
        snapshot
            .subscribers
            .entry("app1".into())
            .or_default()
            .insert("Order".into(), 2);

        let json = snapshot.to_json().unwrap();
        assert_eq!(json, r#"{"app1":{"Order":2}}"#);
        assert_eq!(CheckpointSnapshot::from_json(&json).unwrap(), snapshot);
    }
}
