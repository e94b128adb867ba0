//! The probe engine: walking a bucket's probe chain to find a key, or to
//! find where a new key belongs.
//!
//! Buckets are probed in reverse-bit cursor order (`next_cursor`), starting
//! from the home bucket `hash & mask`, the same walk the scan protocol and
//! the rehash engine use — so a bucket's place in a probe chain, a scan
//! pass, and the rehash migration order all agree. A probe chain continues
//! past a bucket only while that bucket's sticky everfull bit is set — a
//! bucket that has never been completely full can't be hiding a key
//! further down the chain, because insertion always stops at the first
//! bucket with room. This is the open-addressing analogue of a tombstone,
//! except it lives once per bucket instead of once per slot, and it never
//! needs clearing.

use crate::bucket::{next_cursor, truncated_hash_byte, Bucket, ELEMENTS_PER_BUCKET};
use crate::descriptor::{Keyed, TypeDescriptor};
use crate::table::TableSlot;

/// Location of an element within one table: which bucket, which slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Location {
    pub(crate) bucket: usize,
    pub(crate) slot: usize,
}

/// Search `slot`'s probe chain for `key`. Returns the element's location
/// if present.
pub(crate) fn find<T: Keyed>(
    table: &TableSlot<T>,
    hash: u64,
    key: &T::Key,
    descriptor: &TypeDescriptor<T>,
) -> Option<Location> {
    if !table.is_allocated() {
        return None;
    }
    let mask = (table.num_buckets() - 1) as u64;
    let home = hash & mask;
    let byte = truncated_hash_byte(hash);

    let mut idx = home;
    loop {
        let bucket = unsafe { &*table.bucket_ptr(idx as usize) };
        if let Some(slot) = scan_bucket_for_key(bucket, byte, key, descriptor) {
            return Some(Location { bucket: idx as usize, slot });
        }
        if !bucket.is_everfull() {
            return None;
        }
        idx = next_cursor(idx, mask);
        if idx == home {
            return None;
        }
    }
}

fn scan_bucket_for_key<T: Keyed>(
    bucket: &Bucket<T>,
    byte: u8,
    key: &T::Key,
    descriptor: &TypeDescriptor<T>,
) -> Option<usize> {
    for s in 0..ELEMENTS_PER_BUCKET {
        if !bucket.is_slot_occupied(s) || bucket.hash_byte(s) != byte {
            continue;
        }
        let elem = unsafe { &*bucket.element(s) };
        if descriptor.key_eq(elem.key(), key) {
            return Some(s);
        }
    }
    None
}

/// Outcome of probing for an insertion point: either the key already
/// exists (`Duplicate`), or the chain ran out without finding it and a
/// free slot was found along the way (`FreeSlot`). `TableFull` covers the
/// degenerate case where every bucket in the table is everfull (should
/// only happen immediately before a forced resize).
pub(crate) enum InsertProbe {
    Duplicate(Location),
    FreeSlot(Location),
    TableFull,
}

/// Probe for an insertion point, scanning the whole probe chain for a
/// duplicate key and remembering the first free slot seen along the way.
/// Because any bucket that is currently full must have its everfull bit
/// set (the bit is set at the moment a bucket becomes full and never
/// cleared), a chain that ends (a non-everfull bucket) is guaranteed to
/// end at a bucket with at least one free slot.
pub(crate) fn find_insert_slot<T: Keyed>(
    table: &TableSlot<T>,
    hash: u64,
    key: &T::Key,
    descriptor: &TypeDescriptor<T>,
) -> InsertProbe {
    debug_assert!(table.is_allocated());
    let mask = (table.num_buckets() - 1) as u64;
    let home = hash & mask;
    let byte = truncated_hash_byte(hash);

    let mut idx = home;
    let mut first_free: Option<Location> = None;
    loop {
        let bucket = unsafe { &*table.bucket_ptr(idx as usize) };
        if let Some(slot) = scan_bucket_for_key(bucket, byte, key, descriptor) {
            return InsertProbe::Duplicate(Location { bucket: idx as usize, slot });
        }
        if first_free.is_none() {
            if let Some(slot) = bucket.free_slot() {
                first_free = Some(Location { bucket: idx as usize, slot });
            }
        }
        if !bucket.is_everfull() {
            return match first_free {
                Some(loc) => InsertProbe::FreeSlot(loc),
                None => InsertProbe::TableFull,
            };
        }
        idx = next_cursor(idx, mask);
        if idx == home {
            return match first_free {
                Some(loc) => InsertProbe::FreeSlot(loc),
                None => InsertProbe::TableFull,
            };
        }
    }
}
