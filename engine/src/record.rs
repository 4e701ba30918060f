//! Ledger data model: type registrations and change records.

use crate::{Syndex, TypeName};
use serde::{Deserialize, Serialize};

/// Classification of a change. Informational only, sync treats all changes alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Remove,
}

/// A registered resource type and its current counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    /// Type name, unique across the ledger
    pub name: TypeName,
    /// Current counter value (0 right after registration)
    pub syndex: Syndex,
}

impl TypeInfo {
    /// A freshly registered type.
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            syndex: 0,
        }
    }
}

/// One mark event: `id` changed at `syndex`.
///
/// Records are append-only. Updating or removing an id appends a new record,
/// so an id shows up in a range query once per change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub id: String,
    /// Counter value assigned by the ledger when the change was recorded
    pub syndex: Syndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<ChangeOp>,
}

impl ChangeRecord {
    pub fn new(id: impl Into<String>, syndex: Syndex, op: Option<ChangeOp>) -> Self {
        Self {
            id: id.into(),
            syndex,
            op,
        }
    }

    /// Whether this record is a removal tombstone.
    pub fn is_removed(&self) -> bool {
        self.op == Some(ChangeOp::Remove)
    }
}

/// Ids changed above some syndex, plus the counter the caller should store
/// as its next checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    /// Changed ids in syndex order; an id appears once per change
    pub ids: Vec<String>,
    /// The type's counter at query time
    pub syndex: Syndex,
}

impl Changes {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
