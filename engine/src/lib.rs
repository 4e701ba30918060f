//! # Syndex Engine
//!
//! A change-tracking ledger for multi-consumer incremental synchronization.
//!
//! A master records, per resource type, a monotonically increasing counter
//! (the *syndex*) and which ids changed at which value. Subscribers poll for
//! everything that changed since the syndex they last observed and advance
//! their checkpoint in the same step. The master never needs to know its
//! subscribers in advance, and a subscriber never misses or double-counts a
//! change across polls.
//!
//! ## Core Concepts
//!
//! ### Store
//!
//! A [`Store`] is the substrate: per-type counters plus append-only change
//! logs. Three backends are provided or pluggable:
//! - [`MemoryStore`] - in-process, one lock per type
//! - [`JsonStore`] - in-memory with a JSON snapshot rewritten on every write
//! - anything else implementing the trait (e.g. a remote ordered store)
//!
//! ### Ledger
//!
//! The [`Ledger`] owns type registration and the write operations
//! (`mark`, `insert`, `update`, `upsert`, `remove`) as well as the core
//! query [`Ledger::above_syndex`]. Every write bumps the type's counter
//! exactly once per id and appends one [`ChangeRecord`].
//!
//! ### Checkpoints and sync
//!
//! The [`CheckpointTracker`] remembers, per subscriber and type, the last
//! syndex seen. [`SyncCoordinator::sync`] reads that checkpoint, collects the
//! changes above it and stores the new counter, atomically per pair.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use syndex_engine::{CheckpointTracker, Ledger, MemoryStore, SyncCoordinator};
//!
//! // 1. Build the master side
//! let ledger = Arc::new(Ledger::new(Arc::new(MemoryStore::new())));
//! let coordinator = SyncCoordinator::new(Arc::clone(&ledger), CheckpointTracker::in_memory());
//!
//! // 2. A subscriber syncs before anything happened
//! let changes = coordinator.sync("app1", "Order", None).unwrap();
//! assert!(changes.ids.is_empty());
//!
//! // 3. Writers mark changes
//! ledger.insert("Order", "o1").unwrap();
//! ledger.mark("Order", "o2").unwrap();
//!
//! // 4. The subscriber receives exactly what changed
//! let changes = coordinator.sync("app1", "Order", None).unwrap();
//! assert_eq!(changes.ids, vec!["o1", "o2"]);
//! assert_eq!(changes.syndex, 2);
//! ```
//!
//! ## Persistence
//!
//! [`JsonStore`] and [`JsonCheckpoints`] persist through [`LedgerSnapshot`]
//! and [`CheckpointSnapshot`], which serialize with deterministic ordering.

pub mod checkpoint;
pub mod error;
pub mod ledger;
pub mod persist;
pub mod record;
pub mod sanitize;
pub mod snapshot;
pub mod store;
pub mod sync;

mod locks;

// Re-export main types at crate root
pub use checkpoint::{CheckpointStore, CheckpointTracker, MemoryCheckpoints};
pub use error::Error;
pub use ledger::{Ledger, MarkEvent, MarkListener};
pub use persist::{JsonCheckpoints, JsonStore};
pub use record::{ChangeOp, ChangeRecord, Changes, TypeInfo};
pub use sanitize::sanitize;
pub use snapshot::{CheckpointSnapshot, LedgerSnapshot, TypeSnapshot};
pub use store::{MemoryStore, Store};
pub use sync::SyncCoordinator;

/// Per-type version counter value.
pub type Syndex = u64;
/// Name of a synchronized resource type.
pub type TypeName = String;
