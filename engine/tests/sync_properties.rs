//! Ordering and delivery guarantees of the ledger and the sync coordinator.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use syndex_engine::{Error, Ledger, SyncCoordinator};

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn master_lifecycle() {
    let ledger = Ledger::in_memory();
    ledger.register("User").unwrap();

    assert_eq!(ledger.insert("User", "u1").unwrap().syndex, 1);
    assert_eq!(ledger.insert("User", "u2").unwrap().syndex, 2);

    let changes = ledger.above_syndex("User", 1).unwrap();
    assert_eq!(changes.ids, vec!["u2"]);
    assert_eq!(changes.syndex, 2);

    assert_eq!(ledger.set_syndex("User", 5).unwrap(), 5);
    assert_eq!(ledger.get_syndex("User").unwrap(), 5);
    assert_eq!(
        ledger.set_syndex("User", 2),
        Err(Error::RewindRejected {
            current: 5,
            requested: 2
        })
    );
}

#[test]
fn subscriber_lifecycle() {
    let coordinator = SyncCoordinator::in_memory();

    let changes = coordinator.sync("app1", "Order", None).unwrap();
    assert!(changes.ids.is_empty());
    assert_eq!(changes.syndex, 0);

    coordinator
        .ledger()
        .mark_many("Order", &["o1", "o2"])
        .unwrap();
    assert_eq!(coordinator.ledger().get_syndex("Order").unwrap(), 2);

    let changes = coordinator.sync("app1", "Order", None).unwrap();
    assert_eq!(changes.ids, vec!["o1", "o2"]);
    assert_eq!(changes.syndex, 2);

    coordinator.flush("app1").unwrap();
    let changes = coordinator.sync("app1", "Order", None).unwrap();
    assert_eq!(changes.ids, vec!["o1", "o2"]);
    assert_eq!(changes.syndex, 2);
}

#[test]
fn sync_completeness() {
    let coordinator = SyncCoordinator::in_memory();
    coordinator
        .ledger()
        .mark_many("T", &["a", "b", "c"])
        .unwrap();

    let first = coordinator.sync("reader", "T", None).unwrap();
    assert_eq!(first.ids, vec!["a", "b", "c"]);
    assert_eq!(first.syndex, 3);

    let second = coordinator.sync("reader", "T", None).unwrap();
    assert!(second.ids.is_empty());
    assert_eq!(second.syndex, 3);
}

#[test]
fn partial_catch_up() {
    let ledger = Ledger::in_memory();
    for i in 1..=20 {
        ledger.mark("T", &format!("id{i}")).unwrap();
    }

    let changes = ledger.above_syndex("T", 12).unwrap();
    let expected: Vec<String> = (13..=20).map(|i| format!("id{i}")).collect();
    assert_eq!(changes.ids, expected);
    assert_eq!(changes.syndex, 20);
}

#[test]
fn duplicate_insert_keeps_first_syndex() {
    let ledger = Ledger::in_memory();
    ledger.mark("T", "other").unwrap();
    ledger.insert("T", "x").unwrap();

    assert!(matches!(
        ledger.insert("T", "x"),
        Err(Error::DuplicateId { .. })
    ));
    assert_eq!(ledger.syndex_of("T", "x").unwrap(), Some(2));
}

#[test]
fn unknown_type_tolerance() {
    let coordinator = SyncCoordinator::in_memory();
    let changes = coordinator
        .sync("anyName", "NeverRegisteredType", None)
        .unwrap();
    assert!(changes.ids.is_empty());
    assert_eq!(changes.syndex, 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn concurrent_marks_are_gapless() {
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 250;

    let ledger = Arc::new(Ledger::in_memory());
    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                (0..PER_WRITER)
                    .map(|i| ledger.mark("T", &format!("w{w}-{i}")).unwrap().syndex)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for handle in handles {
        let syndexes = handle.join().unwrap();
        // Each writer observes its own marks in increasing order
        assert!(syndexes.windows(2).all(|w| w[0] < w[1]));
        for syndex in syndexes {
            assert!(seen.insert(syndex), "duplicate syndex {syndex}");
        }
    }

    let total = (WRITERS * PER_WRITER) as u64;
    assert_eq!(seen.len() as u64, total);
    assert_eq!(seen.first(), Some(&1));
    assert_eq!(seen.last(), Some(&total));
    assert_eq!(ledger.get_syndex("T").unwrap(), total);
}

#[test]
fn concurrent_inserts_of_same_id() {
    let ledger = Arc::new(Ledger::in_memory());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.insert("T", "same").is_ok())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(ledger.get_syndex("T").unwrap(), 1);
}

#[test]
fn types_are_independent() {
    let ledger = Arc::new(Ledger::in_memory());
    let handles: Vec<_> = ["A", "B", "C", "D"]
        .into_iter()
        .map(|type_name| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..100 {
                    ledger.mark(type_name, &i.to_string()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for type_name in ["A", "B", "C", "D"] {
        assert_eq!(ledger.get_syndex(type_name).unwrap(), 100);
    }
}

#[test]
fn concurrent_syncs_never_duplicate_or_lose() {
    let coordinator = Arc::new(SyncCoordinator::in_memory());
    let writer = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            for i in 0..500 {
                coordinator.ledger().mark("T", &format!("id{i}")).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let mut delivered = Vec::new();
                for _ in 0..200 {
                    delivered.extend(coordinator.sync("shared", "T", None).unwrap().ids);
                }
                delivered
            })
        })
        .collect();

    writer.join().unwrap();
    let mut delivered: Vec<String> = readers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    delivered.extend(coordinator.sync("shared", "T", None).unwrap().ids);

    // Every id exactly once across all syncs of the pair
    let unique: BTreeSet<_> = delivered.iter().cloned().collect();
    assert_eq!(delivered.len(), 500);
    assert_eq!(unique.len(), 500);
    assert_eq!(coordinator.checkpoint("shared", "T").unwrap(), 500);
}

// ============================================================================
// Property-based tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Write {
        Mark(u8),
        Insert(u8),
        Update(u8),
        Remove(u8),
        Upsert(u8),
    }

    fn arb_write() -> impl Strategy<Value = Write> {
        prop_oneof![
            (0u8..8).prop_map(Write::Mark),
            (0u8..8).prop_map(Write::Insert),
            (0u8..8).prop_map(Write::Update),
            (0u8..8).prop_map(Write::Remove),
            (0u8..8).prop_map(Write::Upsert),
        ]
    }

    proptest! {
        #[test]
        fn prop_successful_writes_are_strictly_increasing(
            writes in prop::collection::vec(arb_write(), 1..64)
        ) {
            let ledger = Ledger::in_memory();
            ledger.register("T").unwrap();

            let mut syndexes = Vec::new();
            for write in writes {
                let result = match write {
                    Write::Mark(id) => ledger.mark("T", &id.to_string()),
                    Write::Insert(id) => ledger.insert("T", &id.to_string()),
                    Write::Update(id) => ledger.update("T", &id.to_string()),
                    Write::Remove(id) => ledger.remove("T", &id.to_string()),
                    Write::Upsert(id) => ledger.upsert("T", &id.to_string()),
                };
                if let Ok(record) = result {
                    syndexes.push(record.syndex);
                }
            }

            let expected: Vec<u64> = (1..=syndexes.len() as u64).collect();
            prop_assert_eq!(&syndexes, &expected);
            prop_assert_eq!(ledger.get_syndex("T").unwrap(), syndexes.len() as u64);
        }

        #[test]
        fn prop_above_syndex_returns_exact_suffix(
            count in 1usize..50,
            from in 0u64..60,
        ) {
            let ledger = Ledger::in_memory();
            for i in 0..count {
                ledger.mark("T", &format!("id{i}")).unwrap();
            }

            let changes = ledger.above_syndex("T", from).unwrap();
            let expected: Vec<String> = (0..count)
                .filter(|i| (*i as u64 + 1) > from)
                .map(|i| format!("id{i}"))
                .collect();
            prop_assert_eq!(changes.ids, expected);
            prop_assert_eq!(changes.syndex, count as u64);
        }

        #[test]
        fn prop_interleaved_syncs_deliver_each_change_once(
            batches in prop::collection::vec(0usize..5, 1..10)
        ) {
            let coordinator = SyncCoordinator::in_memory();
            let mut marked = 0usize;
            let mut delivered = 0usize;

            for batch in batches {
                for _ in 0..batch {
                    coordinator.ledger().mark("T", &format!("id{marked}")).unwrap();
                    marked += 1;
                }
                delivered += coordinator.sync("app", "T", None).unwrap().ids.len();
            }

            prop_assert_eq!(delivered, marked);
        }
    }
}
