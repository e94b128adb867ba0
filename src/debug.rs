//! Debug-only instrumentation: bucket-population histogram, longest
//! probing chain, and a textual dump. Gated behind the `debug-tools`
//! feature; none of this is used by (or required for) correctness, only
//! by tests and interactive debugging.

use std::fmt::Write as _;

use crate::bucket::{next_cursor, ELEMENTS_PER_BUCKET};
use crate::descriptor::Keyed;
use crate::table::Table;

impl<T: Keyed> Table<T> {
    /// Number of buckets, indexed by occupied-slot count (0..=7 on
    /// 64-bit, 0..=12 on 32-bit), across both live tables.
    pub fn debug_histogram(&self) -> Vec<u32> {
        let mut histogram = vec![0u32; ELEMENTS_PER_BUCKET + 1];
        for slot in &self.slots {
            if !slot.is_allocated() {
                continue;
            }
            for idx in 0..slot.num_buckets() {
                let bucket = unsafe { &*slot.bucket_ptr(idx) };
                histogram[bucket.count_occupied() as usize] += 1;
            }
        }
        histogram
    }

    /// Longest run of consecutive everfull buckets starting from any
    /// primary bucket, in the table not currently being drained by a
    /// rehash (table 0 either way).
    pub fn debug_longest_chain(&self) -> u32 {
        let slot = &self.slots[0];
        if !slot.is_allocated() {
            return 0;
        }
        let mask = (slot.num_buckets() - 1) as u64;
        let mut longest = 0;
        for home in 0..slot.num_buckets() as u64 {
            let mut len = 0u32;
            let mut idx = home;
            loop {
                let bucket = unsafe { &*slot.bucket_ptr(idx as usize) };
                len += 1;
                if !bucket.is_everfull() {
                    break;
                }
                idx = next_cursor(idx, mask);
                if idx == home {
                    break;
                }
            }
            longest = longest.max(len);
        }
        longest
    }

    /// Line-per-bucket textual dump across both live tables: index,
    /// everfull bit, presence bitmap, per-slot hash bytes.
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        for (table_idx, slot) in self.slots.iter().enumerate() {
            if !slot.is_allocated() {
                continue;
            }
            for idx in 0..slot.num_buckets() {
                let bucket = unsafe { &*slot.bucket_ptr(idx) };
                let hashes: Vec<u8> = (0..ELEMENTS_PER_BUCKET).map(|s| bucket.hash_byte(s)).collect();
                let _ = writeln!(
                    out,
                    "table={table_idx} bucket={idx} everfull={} presence={:#b} hashes={:?}",
                    bucket.is_everfull(),
                    bucket.presence(),
                    hashes
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::{Keyed, TypeDescriptor};
    use crate::table::Table;

    #[derive(Debug, Clone)]
    struct Item(u32);

    impl Keyed for Item {
        type Key = u32;
        fn key(&self) -> &u32 {
            &self.0
        }
    }

    #[test]
    fn histogram_matches_len() {
        let mut table: Table<Item> = Table::new(TypeDescriptor::new());
        for i in 0..50u32 {
            table.add(Item(i)).unwrap();
        }
        let histogram = table.debug_histogram();
        let total: u32 = histogram
            .iter()
            .enumerate()
            .map(|(occupied, &count)| occupied as u32 * count)
            .sum();
        assert_eq!(total as usize, table.len());
    }

    #[test]
    fn dump_does_not_panic_on_empty_table() {
        let table: Table<Item> = Table::new(TypeDescriptor::new());
        assert_eq!(table.debug_dump(), "");
        assert_eq!(table.debug_longest_chain(), 0);
    }
}
