//! End-to-end scenarios exercising `Table` as a whole: insertion and
//! lookup across a full rehash cycle, scan-to-exhaustion interleaved with
//! deletes, seed-stable hash reproducibility, fast-forwarding a rehash
//! that's forced mid-flight by a demanded expansion, scan coverage across
//! a resize, and destructor accounting under `replace`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use hashtab::policy::{set_hash_seed, set_resize_policy};
use hashtab::{AddOutcome, Keyed, ResizePolicy, Table, TypeDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: u64,
    value: u64,
}

impl Keyed for Entry {
    type Key = u64;
    fn key(&self) -> &u64 {
        &self.key
    }
}

#[test]
fn sixteen_keys_insert_and_find() {
    let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
    for i in 0..16u64 {
        assert!(table.add(Entry { key: i, value: i * 10 }).is_ok());
    }
    assert_eq!(table.len(), 16);
    for i in 0..16u64 {
        assert_eq!(table.find(&i).map(|e| e.value), Some(i * 10));
    }
    assert!(table.find(&16).is_none());

    // duplicate insert leaves the table untouched and hands the element back
    match table.add_raw(Entry { key: 3, value: 999 }) {
        AddOutcome::Duplicate { elem, existing } => {
            assert_eq!(elem.value, 999);
            assert_eq!(existing.value, 30);
        }
        AddOutcome::Inserted => panic!("expected a duplicate"),
    }
}

#[test]
fn scan_to_exhaustion_survives_interleaved_deletes() {
    let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
    for i in 0..500u64 {
        table.add(Entry { key: i, value: i }).unwrap();
    }

    let mut seen = HashSet::new();
    let mut cursor = 0u64;
    let mut deletes_done = false;
    loop {
        cursor = table.scan(cursor, |e| {
            seen.insert(e.key);
        });
        if !deletes_done {
            for i in (0..500u64).step_by(7) {
                table.delete(&i);
            }
            deletes_done = true;
        }
        if cursor == 0 {
            break;
        }
    }

    // Elements untouched by the interleaved deletes must all have been
    // observed at least once.
    for i in 0..500u64 {
        if i % 7 != 0 {
            assert!(seen.contains(&i), "missing element {i}");
        }
    }
}

#[test]
fn seed_stable_hash_reproducibility() {
    set_hash_seed([42u8; 16]);

    let build = || {
        let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
        for i in 0..64u64 {
            table.add(Entry { key: i, value: i }).unwrap();
        }
        table
    };

    let mut a = build();
    let mut b = build();

    let mut dump_a = Vec::new();
    let mut cursor = 0u64;
    loop {
        cursor = a.scan(cursor, |e| dump_a.push(e.key));
        if cursor == 0 {
            break;
        }
    }
    dump_a.sort();

    let mut dump_b = Vec::new();
    cursor = 0;
    loop {
        cursor = b.scan(cursor, |e| dump_b.push(e.key));
        if cursor == 0 {
            break;
        }
    }
    dump_b.sort();

    assert_eq!(dump_a, dump_b);

    set_hash_seed([0u8; 16]);
}

#[test]
fn fast_forward_rehash_under_expand() {
    let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
    for i in 0..10u64 {
        table.add(Entry { key: i, value: i }).unwrap();
    }

    // Pause incremental rehashing, then force growth far beyond the
    // current size: expand() must fast-forward any in-progress work and
    // leave the table immediately usable at the new capacity regardless
    // of the pause.
    table.pause_rehashing();
    assert!(table.expand(10_000));
    assert!(!table.is_rehashing());
    table.resume_rehashing();

    for i in 0..10u64 {
        assert_eq!(table.find(&i).map(|e| e.value), Some(i));
    }
    for i in 10..10_000u64 {
        table.add(Entry { key: i, value: i }).unwrap();
    }
    assert_eq!(table.len(), 10_000);
}

#[test]
fn scan_coverage_under_resize() {
    let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
    for i in 0..20u64 {
        table.add(Entry { key: i, value: i }).unwrap();
    }

    let mut seen = HashSet::new();
    let mut cursor = 0u64;
    let mut grown = false;
    loop {
        cursor = table.scan(cursor, |e| {
            seen.insert(e.key);
        });
        if !grown {
            for i in 20..2000u64 {
                table.add(Entry { key: i, value: i }).unwrap();
            }
            grown = true;
        }
        if cursor == 0 {
            break;
        }
    }

    for i in 0..20u64 {
        assert!(seen.contains(&i), "pre-resize element {i} missing from scan");
    }
}

#[test]
fn scan_coverage_under_shrink() {
    // slots[1] (the shrink target) ends up with fewer buckets than
    // slots[0] (the table being drained) for the whole span of this test:
    // the opposite size relationship from a growing rehash, and the one
    // the scan protocol has to get right too.
    let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
    table.try_expand(10_000).unwrap();
    for i in 0..10_000u64 {
        table.add(Entry { key: i, value: i }).unwrap();
    }

    // Pausing before the deletes means the shrink that `delete` triggers
    // never gets to migrate a single bucket, so it stays in progress
    // (slots[1] allocated and smaller, slots[0] still holding everything
    // left) for the entire scan below.
    table.pause_rehashing();
    for i in 100..10_000u64 {
        table.delete(&i);
    }
    assert!(table.is_rehashing());

    let mut seen = HashSet::new();
    let mut cursor = 0u64;
    loop {
        cursor = table.scan(cursor, |e| {
            seen.insert(e.key);
        });
        if cursor == 0 {
            break;
        }
    }
    for i in 0..100u64 {
        assert!(seen.contains(&i), "element {i} missing from scan during shrink");
    }
    table.resume_rehashing();
}

#[test]
fn replace_semantics_count_destructor_calls() {
    let destroyed = Rc::new(RefCell::new(0u32));
    let destroyed_clone = destroyed.clone();
    let descriptor = TypeDescriptor::<Entry>::new().with_destructor(move |_| {
        *destroyed_clone.borrow_mut() += 1;
    });
    let mut table = Table::new(descriptor);

    assert!(table.replace(Entry { key: 1, value: 1 }));
    assert_eq!(*destroyed.borrow(), 0);

    assert!(!table.replace(Entry { key: 1, value: 2 }));
    assert_eq!(*destroyed.borrow(), 1);

    assert!(table.delete(&1));
    assert_eq!(*destroyed.borrow(), 2);

    // a duplicate rejected by `add` never runs the destructor
    table.add(Entry { key: 2, value: 1 }).unwrap();
    assert!(table.add(Entry { key: 2, value: 2 }).is_err());
    assert_eq!(*destroyed.borrow(), 2);
}

#[test]
fn resize_policy_forbid_keeps_capacity_fixed_under_soft_pressure() {
    // try_expand(64) sizes the table to 16 buckets (112-element capacity).
    // 95 elements crosses the 77% soft ceiling but stays under the 90%
    // hard one, so Forbid should hold the table at its current size.
    let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
    table.try_expand(64).unwrap();

    set_resize_policy(ResizePolicy::Forbid);
    for i in 0..95u64 {
        table.add(Entry { key: i, value: i }).unwrap();
    }
    assert!(!table.is_rehashing());
    set_resize_policy(ResizePolicy::Allow);

    for i in 0..95u64 {
        assert_eq!(table.find(&i).map(|e| e.value), Some(i));
    }
}
