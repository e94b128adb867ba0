//! The public surface: `Table<T>` and its operations. Ties together the
//! bucket layout, sizing policy, probe engine, and rehash engine.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr;

use crate::bucket::{truncated_hash_byte, Bucket, ELEMENTS_PER_BUCKET};
use crate::descriptor::{Keyed, TypeDescriptor};
use crate::error::{HashtabError, Result};
use crate::policy::{current_hash_seed, current_resize_policy};
use crate::probe::{self, InsertProbe, Location};
use crate::rehash;
use crate::scan;
use crate::sizing;

/// One of the table's (at most two) live bucket arrays.
pub(crate) struct TableSlot<T> {
    pub(crate) buckets: *mut Bucket<T>,
    pub(crate) bucket_exp: i32,
    pub(crate) used: usize,
}

impl<T> TableSlot<T> {
    pub(crate) const fn unallocated() -> Self {
        TableSlot {
            buckets: ptr::null_mut(),
            bucket_exp: -1,
            used: 0,
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_null()
    }

    pub(crate) fn bucket_exp(&self) -> u32 {
        debug_assert!(self.bucket_exp >= 0);
        self.bucket_exp as u32
    }

    pub(crate) fn num_buckets(&self) -> usize {
        if self.bucket_exp < 0 {
            0
        } else {
            1usize << self.bucket_exp
        }
    }

    pub(crate) fn bucket_ptr(&self, idx: usize) -> *mut Bucket<T> {
        debug_assert!(idx < self.num_buckets());
        unsafe { self.buckets.add(idx) }
    }

    fn layout_for(exp: u32) -> Layout {
        let count = 1usize << exp;
        Layout::array::<Bucket<T>>(count).expect("bucket array layout overflow")
    }

    /// Allocate a zeroed bucket array, aborting the process on OOM. Used
    /// by internal auto-resizes triggered from an otherwise-infallible
    /// insert: there is no caller-facing channel to report failure
    /// mid-insert, so a failed allocation here is treated as fatal, the
    /// same way the global allocator treats `Vec` growth failures.
    pub(crate) fn allocate_fatal(exp: u32) -> Self {
        let layout = Self::layout_for(exp);
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }
        TableSlot {
            buckets: ptr as *mut Bucket<T>,
            bucket_exp: exp as i32,
            used: 0,
        }
    }

    /// Allocate a zeroed bucket array, reporting OOM instead of aborting.
    /// Used by the public `try_expand` path.
    pub(crate) fn allocate_checked(exp: u32) -> Result<Self> {
        let layout = Self::layout_for(exp);
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(HashtabError::OutOfMemory {
                buckets: 1usize << exp,
            });
        }
        Ok(TableSlot {
            buckets: ptr as *mut Bucket<T>,
            bucket_exp: exp as i32,
            used: 0,
        })
    }

    pub(crate) fn dealloc_buckets(&mut self) {
        if self.buckets.is_null() {
            return;
        }
        let layout = Self::layout_for(self.bucket_exp());
        unsafe { dealloc(self.buckets as *mut u8, layout) };
        self.buckets = ptr::null_mut();
        self.bucket_exp = -1;
        self.used = 0;
    }
}

/// Outcome of [`Table::add_raw`]: either the element was inserted, or a
/// duplicate key was already present, in which case the caller gets both
/// their (unconsumed) element back and a reference to the existing one.
pub enum AddOutcome<'a, T> {
    Inserted,
    Duplicate { elem: T, existing: &'a T },
}

/// A single-threaded, open-addressing hash table with cache-line-sized
/// buckets and incremental two-table rehashing.
///
/// `Table` is intentionally neither `Send` nor `Sync`: it has no internal
/// synchronization, and sharing it across threads (even read-only, since
/// `find` nudges an in-progress rehash forward) is a caller error, not a
/// supported usage.
pub struct Table<T: Keyed> {
    pub(crate) slots: [TableSlot<T>; 2],
    pub(crate) rehash_idx: isize,
    pub(crate) pause_rehash: u32,
    pub(crate) pause_auto_shrink: u32,
    pub(crate) descriptor: TypeDescriptor<T>,
    pub(crate) seed: [u8; 16],
    metadata: Vec<u8>,
}

impl<T: Keyed> Table<T> {
    pub fn new(descriptor: TypeDescriptor<T>) -> Self {
        let metadata = vec![0u8; descriptor.metadata_size];
        Table {
            slots: [TableSlot::unallocated(), TableSlot::unallocated()],
            rehash_idx: -1,
            pause_rehash: 0,
            pause_auto_shrink: 0,
            seed: current_hash_seed(),
            descriptor,
            metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.slots[0].used + self.slots[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn descriptor(&self) -> &TypeDescriptor<T> {
        &self.descriptor
    }

    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut [u8] {
        &mut self.metadata
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx >= 0
    }

    pub fn is_rehashing_paused(&self) -> bool {
        self.pause_rehash > 0
    }

    pub fn pause_rehashing(&mut self) {
        self.pause_rehash += 1;
    }

    pub fn resume_rehashing(&mut self) {
        debug_assert!(
            self.pause_rehash > 0,
            "resume_rehashing called without a matching pause_rehashing"
        );
        self.pause_rehash = self.pause_rehash.saturating_sub(1);
    }

    pub fn pause_auto_shrink(&mut self) {
        self.pause_auto_shrink += 1;
    }

    pub fn resume_auto_shrink(&mut self) {
        debug_assert!(
            self.pause_auto_shrink > 0,
            "resume_auto_shrink called without a matching pause_auto_shrink"
        );
        self.pause_auto_shrink = self.pause_auto_shrink.saturating_sub(1);
    }

    fn hash_of(&self, key: &T::Key) -> u64 {
        self.descriptor.hash(self.seed, key)
    }

    fn element_ref(slot: &TableSlot<T>, loc: Location) -> &T {
        let bucket = unsafe { &*slot.bucket_ptr(loc.bucket) };
        unsafe { &*bucket.element(loc.slot) }
    }

    /// Look up `key`. Under the `Allow` resize policy this also nudges an
    /// in-progress rehash forward by one step, the same as every mutating
    /// operation does: a read-heavy workload still needs the migration to
    /// make progress, or it would never finish.
    pub fn find(&mut self, key: &T::Key) -> Option<&T> {
        if current_resize_policy() == sizing::ResizePolicy::Allow {
            rehash::step_if_active(self);
        }

        let hash = self.hash_of(key);
        if self.is_rehashing() {
            if let Some(loc) = probe::find(&self.slots[1], hash, key, &self.descriptor) {
                return Some(Self::element_ref(&self.slots[1], loc));
            }
        }
        probe::find(&self.slots[0], hash, key, &self.descriptor)
            .map(|loc| Self::element_ref(&self.slots[0], loc))
    }

    fn ensure_target_allocated(&mut self, target_idx: usize) {
        if !self.slots[target_idx].is_allocated() {
            let exp = sizing::next_bucket_exp(1).expect("capacity of 1 element cannot overflow");
            self.slots[target_idx] = TableSlot::allocate_fatal(exp);
        }
    }

    fn insert_at(&mut self, table_idx: usize, loc: Location, elem: T, hash: u64) {
        let raw = Box::into_raw(Box::new(elem));
        let byte = truncated_hash_byte(hash);
        let bucket = unsafe { &mut *self.slots[table_idx].bucket_ptr(loc.bucket) };
        bucket.set_element(loc.slot, raw);
        bucket.set_hash_byte(loc.slot, byte);
        bucket.set_slot_occupied(loc.slot);
        bucket.set_everfull();
        self.slots[table_idx].used += 1;
    }

    fn replace_at(&mut self, table_idx: usize, loc: Location, elem: T, hash: u64) {
        let byte = truncated_hash_byte(hash);
        let old_ptr = {
            let bucket = unsafe { &mut *self.slots[table_idx].bucket_ptr(loc.bucket) };
            let old_ptr = bucket.element(loc.slot);
            let new_ptr = Box::into_raw(Box::new(elem));
            bucket.set_element(loc.slot, new_ptr);
            bucket.set_hash_byte(loc.slot, byte);
            old_ptr
        };
        let old = take_element(old_ptr);
        self.descriptor.destroy(old);
    }

    fn force_expand_for_insert(&mut self, table_idx: usize) {
        let current_exp = self.slots[table_idx].bucket_exp();
        rehash::begin(self, current_exp + 1);
        rehash::fast_forward(self, true);
    }

    /// Insert `elem`. Returns `Ok(())` when inserted, or `Err(elem)` (the
    /// element handed back untouched, no destructor run) when a duplicate
    /// key was already present.
    pub fn add(&mut self, elem: T) -> std::result::Result<(), T> {
        rehash::step_if_active(self);
        rehash::expand_if_needed(self);

        let hash = self.hash_of(elem.key());
        if self.is_rehashing() && probe::find(&self.slots[0], hash, elem.key(), &self.descriptor).is_some() {
            return Err(elem);
        }
        let target_idx = if self.is_rehashing() { 1 } else { 0 };
        self.ensure_target_allocated(target_idx);

        match probe::find_insert_slot(&self.slots[target_idx], hash, elem.key(), &self.descriptor) {
            InsertProbe::Duplicate(_) => Err(elem),
            InsertProbe::FreeSlot(loc) => {
                self.insert_at(target_idx, loc, elem, hash);
                Ok(())
            }
            InsertProbe::TableFull => {
                self.force_expand_for_insert(target_idx);
                let target_idx = if self.is_rehashing() { 1 } else { 0 };
                match probe::find_insert_slot(&self.slots[target_idx], hash, elem.key(), &self.descriptor) {
                    InsertProbe::FreeSlot(loc) => {
                        self.insert_at(target_idx, loc, elem, hash);
                        Ok(())
                    }
                    _ => unreachable!("table full immediately after forced expansion"),
                }
            }
        }
    }

    /// Like [`Table::add`], but on a duplicate key also hands back a
    /// reference to the element already stored under that key.
    pub fn add_raw(&mut self, elem: T) -> AddOutcome<'_, T> {
        rehash::step_if_active(self);
        rehash::expand_if_needed(self);

        let hash = self.hash_of(elem.key());
        if self.is_rehashing() {
            if let Some(loc) = probe::find(&self.slots[0], hash, elem.key(), &self.descriptor) {
                let existing = Self::element_ref(&self.slots[0], loc);
                return AddOutcome::Duplicate { elem, existing };
            }
        }
        let target_idx = if self.is_rehashing() { 1 } else { 0 };
        self.ensure_target_allocated(target_idx);

        match probe::find_insert_slot(&self.slots[target_idx], hash, elem.key(), &self.descriptor) {
            InsertProbe::Duplicate(loc) => {
                let existing = Self::element_ref(&self.slots[target_idx], loc);
                AddOutcome::Duplicate { elem, existing }
            }
            InsertProbe::FreeSlot(loc) => {
                self.insert_at(target_idx, loc, elem, hash);
                AddOutcome::Inserted
            }
            InsertProbe::TableFull => {
                self.force_expand_for_insert(target_idx);
                let target_idx = if self.is_rehashing() { 1 } else { 0 };
                match probe::find_insert_slot(&self.slots[target_idx], hash, elem.key(), &self.descriptor) {
                    InsertProbe::FreeSlot(loc) => {
                        self.insert_at(target_idx, loc, elem, hash);
                        AddOutcome::Inserted
                    }
                    _ => unreachable!("table full immediately after forced expansion"),
                }
            }
        }
    }

    /// Insert `elem`, replacing (and destroying) any element already
    /// stored under the same key. Returns `true` if this was a fresh
    /// insertion, `false` if an existing element was replaced.
    pub fn replace(&mut self, elem: T) -> bool {
        rehash::step_if_active(self);
        rehash::expand_if_needed(self);

        let hash = self.hash_of(elem.key());
        if self.is_rehashing() {
            if let Some(loc) = probe::find(&self.slots[0], hash, elem.key(), &self.descriptor) {
                self.replace_at(0, loc, elem, hash);
                return false;
            }
        }
        let target_idx = if self.is_rehashing() { 1 } else { 0 };
        self.ensure_target_allocated(target_idx);

        match probe::find_insert_slot(&self.slots[target_idx], hash, elem.key(), &self.descriptor) {
            InsertProbe::Duplicate(loc) => {
                self.replace_at(target_idx, loc, elem, hash);
                false
            }
            InsertProbe::FreeSlot(loc) => {
                self.insert_at(target_idx, loc, elem, hash);
                true
            }
            InsertProbe::TableFull => {
                self.force_expand_for_insert(target_idx);
                let target_idx = if self.is_rehashing() { 1 } else { 0 };
                match probe::find_insert_slot(&self.slots[target_idx], hash, elem.key(), &self.descriptor) {
                    InsertProbe::FreeSlot(loc) => {
                        self.insert_at(target_idx, loc, elem, hash);
                        true
                    }
                    _ => unreachable!("table full immediately after forced expansion"),
                }
            }
        }
    }

    /// Remove and destroy the element stored under `key`, if any.
    pub fn delete(&mut self, key: &T::Key) -> bool {
        rehash::step_if_active(self);
        let hash = self.hash_of(key);

        let order: &[usize] = if self.is_rehashing() { &[1, 0] } else { &[0] };
        for &idx in order {
            if let Some(loc) = probe::find(&self.slots[idx], hash, key, &self.descriptor) {
                let ptr = {
                    let bucket = unsafe { &mut *self.slots[idx].bucket_ptr(loc.bucket) };
                    bucket.remove_slot(loc.slot)
                };
                self.slots[idx].used -= 1;
                let elem = take_element(ptr);
                self.descriptor.destroy(elem);
                rehash::shrink_if_needed(self);
                return true;
            }
        }
        false
    }

    /// Grow the table (via a rehash, run to completion immediately) so it
    /// can hold at least `min_capacity` elements without crossing the
    /// soft fill ceiling. Returns `false` if the table is already large
    /// enough, or if `min_capacity` is large enough that the required
    /// bucket count would overflow (the resize is simply refused, per
    /// `spec.md` §4.4). Aborts the process on allocation failure; see
    /// [`Table::try_expand`] for a fallible variant.
    pub fn expand(&mut self, min_capacity: usize) -> bool {
        let current_exp = self.active_exp();
        let target_exp = match sizing::next_bucket_exp(min_capacity) {
            Some(exp) => exp.max(current_exp),
            None => return false,
        };
        if self.has_any_table() && target_exp <= current_exp {
            return false;
        }
        rehash::begin(self, target_exp);
        rehash::fast_forward(self, true);
        true
    }

    /// Fallible variant of [`Table::expand`]: reports
    /// `HashtabError::OutOfMemory` instead of aborting if the new bucket
    /// array can't be allocated. The table is left unchanged on error, and
    /// also on an overflowing `min_capacity` (see [`Table::expand`]).
    pub fn try_expand(&mut self, min_capacity: usize) -> Result<bool> {
        let current_exp = self.active_exp();
        let target_exp = match sizing::next_bucket_exp(min_capacity) {
            Some(exp) => exp.max(current_exp),
            None => return Ok(false),
        };
        if self.has_any_table() && target_exp <= current_exp {
            return Ok(false);
        }

        let new_slot = TableSlot::allocate_checked(target_exp)?;
        if self.is_rehashing() {
            rehash::fast_forward(self, true);
        }
        if self.slots[0].is_allocated() {
            self.slots[1] = new_slot;
            self.rehash_idx = 0;
            self.descriptor.notify_rehashing_started();
            rehash::fast_forward(self, true);
        } else {
            self.slots[0] = new_slot;
        }
        Ok(true)
    }

    fn active_exp(&self) -> u32 {
        if self.is_rehashing() {
            self.slots[1].bucket_exp()
        } else if self.slots[0].is_allocated() {
            self.slots[0].bucket_exp()
        } else {
            0
        }
    }

    fn has_any_table(&self) -> bool {
        self.slots[0].is_allocated() || self.is_rehashing()
    }

    /// Visit up to one full pass of elements starting at `cursor` (0 to
    /// begin), invoking `f` with a shared reference to each. Returns the
    /// next cursor to pass in, or 0 once a full pass has completed. See
    /// `spec.md` §4.6 for the scan protocol's stability guarantees.
    pub fn scan<F: FnMut(&T)>(&mut self, cursor: u64, mut f: F) -> u64 {
        scan::scan(self, cursor, |ptr| f(unsafe { &*ptr }))
    }

    /// Like [`Table::scan`], but `f` receives a mutable reference, for
    /// in-place rewrites that don't change the element's key.
    pub fn scan_mut<F: FnMut(&mut T)>(&mut self, cursor: u64, mut f: F) -> u64 {
        scan::scan(self, cursor, |ptr| f(unsafe { &mut *ptr }))
    }
}

pub(crate) fn take_element<T>(ptr: *mut T) -> T {
    unsafe { *Box::from_raw(ptr) }
}

impl<T: Keyed> Drop for Table<T> {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if !slot.is_allocated() {
                continue;
            }
            for idx in 0..slot.num_buckets() {
                let bucket = unsafe { &mut *slot.bucket_ptr(idx) };
                for s in 0..ELEMENTS_PER_BUCKET {
                    if bucket.is_slot_occupied(s) {
                        let ptr = bucket.element(s);
                        let elem = take_element(ptr);
                        self.descriptor.destroy(elem);
                    }
                }
            }
            slot.dealloc_buckets();
        }
    }
}
