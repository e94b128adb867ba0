//! The rehash engine: incremental migration of elements from `slots[0]`
//! into a larger or smaller `slots[1]`, amortized across normal
//! operations, with a fast-forward path for when a resize is needed
//! immediately (an insert that finds the table completely full, or an
//! explicit `expand`/`try_expand` call).

use crate::bucket::{next_cursor, truncated_hash_byte, ELEMENTS_PER_BUCKET};
use crate::descriptor::Keyed;
use crate::policy::current_resize_policy;
use crate::probe::{self, InsertProbe};
use crate::sizing::{self, ResizePolicy, ResizeUrgency};
use crate::table::{Table, TableSlot};

/// Buckets migrated per incremental step when a normal operation (find,
/// add, delete) nudges an in-progress rehash along.
const REHASH_STEP_BUCKETS: usize = 1;

/// Start resizing towards `new_exp` buckets. If a rehash is already in
/// progress it is first fast-forwarded to completion (a resize demanded
/// mid-rehash always wins over the one already running), matching
/// `spec.md`'s note that a second resize request completes the first
/// before starting over.
pub(crate) fn begin<T: Keyed>(table: &mut Table<T>, new_exp: u32) {
    if table.is_rehashing() {
        fast_forward(table, true);
    }

    if !table.slots[0].is_allocated() {
        table.slots[0] = TableSlot::allocate_fatal(new_exp);
        return;
    }

    if table.slots[0].bucket_exp() == new_exp {
        return;
    }

    log::debug!(
        "rehash begin: {} -> {} buckets",
        table.slots[0].num_buckets(),
        1usize << new_exp
    );
    table.slots[1] = TableSlot::allocate_fatal(new_exp);
    table.rehash_idx = 0;
    table.descriptor.notify_rehashing_started();
}

/// Migrate up to `max_buckets` buckets of `slots[0]` into `slots[1]`,
/// walking the source bucket index in the same reverse-bit cursor order
/// the scan protocol uses (`spec.md` §4.4: "Advance `rehashIdx =
/// nextCursor(rehashIdx, oldMask)`"), so that a bucket's position in the
/// rehash walk and its position in a concurrent scan stay in lockstep. A
/// no-op if no rehash is in progress, or if rehashing is paused.
pub(crate) fn rehash_step<T: Keyed>(table: &mut Table<T>, max_buckets: usize) {
    if !table.is_rehashing() || table.pause_rehash > 0 {
        return;
    }
    let old_mask = (table.slots[0].num_buckets() - 1) as u64;
    let mut migrated = 0;
    while migrated < max_buckets {
        let idx = table.rehash_idx as usize;
        migrate_bucket(table, idx);
        migrated += 1;
        let next = next_cursor(idx as u64, old_mask);
        if next == 0 {
            log::trace!("rehash step: migrated {migrated} bucket(s), cycle complete");
            complete(table);
            return;
        }
        table.rehash_idx = next as isize;
    }
    log::trace!(
        "rehash step: migrated {migrated} bucket(s), rehash_idx now {}",
        table.rehash_idx
    );
}

/// Nudge an in-progress rehash forward by one step's worth of work, if
/// it's running and not paused. Called from every public operation so
/// rehash cost is amortized rather than paid in one lump at resize time.
pub(crate) fn step_if_active<T: Keyed>(table: &mut Table<T>) {
    rehash_step(table, REHASH_STEP_BUCKETS);
}

/// Drive an in-progress rehash to completion immediately. `force` bypass
/// `pause_rehashing`: an explicit resize call, or an insert that found
/// the table completely full, both need the table in its final state
/// right away and override the cooperative pause.
pub(crate) fn fast_forward<T: Keyed>(table: &mut Table<T>, force: bool) {
    if !table.is_rehashing() {
        return;
    }
    if table.pause_rehash > 0 && !force {
        return;
    }
    let total_buckets = table.slots[0].num_buckets();
    let saved_pause = table.pause_rehash;
    if force {
        table.pause_rehash = 0;
    }
    rehash_step(table, total_buckets);
    if force {
        table.pause_rehash = saved_pause;
    }
}

fn migrate_bucket<T: Keyed>(table: &mut Table<T>, bucket_idx: usize) {
    for slot_idx in 0..ELEMENTS_PER_BUCKET {
        let (occupied, ptr) = {
            let bucket0 = unsafe { &*table.slots[0].bucket_ptr(bucket_idx) };
            (bucket0.is_slot_occupied(slot_idx), bucket0.element(slot_idx))
        };
        if !occupied {
            continue;
        }

        let key_hash = {
            let elem = unsafe { &*ptr };
            table.descriptor.hash(table.seed, elem.key())
        };

        {
            let bucket0 = unsafe { &mut *table.slots[0].bucket_ptr(bucket_idx) };
            bucket0.remove_slot(slot_idx);
        }
        table.slots[0].used -= 1;

        let key = unsafe { &*ptr }.key();
        match probe::find_insert_slot(&table.slots[1], key_hash, key, &table.descriptor) {
            InsertProbe::FreeSlot(loc) => {
                let byte = truncated_hash_byte(key_hash);
                let bucket1 = unsafe { &mut *table.slots[1].bucket_ptr(loc.bucket) };
                bucket1.set_element(loc.slot, ptr);
                bucket1.set_hash_byte(loc.slot, byte);
                bucket1.set_slot_occupied(loc.slot);
                bucket1.set_everfull();
                table.slots[1].used += 1;
            }
            InsertProbe::Duplicate(_) => {
                unreachable!("migrated key already present in destination table")
            }
            InsertProbe::TableFull => {
                unreachable!("destination table sized too small for its own migration")
            }
        }
    }
}

fn complete<T: Keyed>(table: &mut Table<T>) {
    log::debug!("rehash complete: now {} buckets", table.slots[1].num_buckets());
    table.slots[0].dealloc_buckets();
    table.slots.swap(0, 1);
    table.rehash_idx = -1;
    table.descriptor.notify_rehashing_completed();
}

/// Check the active table's fill against the soft/hard expansion
/// thresholds and the process-wide resize policy, starting a rehash if
/// warranted. Called after every insertion.
pub(crate) fn expand_if_needed<T: Keyed>(table: &mut Table<T>) {
    if table.is_rehashing() || !table.slots[0].is_allocated() {
        return;
    }
    let exp = table.slots[0].bucket_exp();
    let urgency = sizing::expand_urgency(table.slots[0].used, exp);
    let policy = current_resize_policy();
    if should_act_on(urgency, policy) {
        begin(table, exp + 1);
    } else if urgency != ResizeUrgency::None {
        log::trace!("expand deferred: urgency={urgency:?} policy={policy:?}");
    }
}

/// Check the active table's fill against the soft/hard shrink thresholds,
/// starting a rehash to a smaller size if warranted. Called after every
/// deletion, unless auto-shrink is paused.
pub(crate) fn shrink_if_needed<T: Keyed>(table: &mut Table<T>) {
    if table.is_rehashing() || table.pause_auto_shrink > 0 || !table.slots[0].is_allocated() {
        return;
    }
    let exp = table.slots[0].bucket_exp();
    if exp == 0 {
        return;
    }
    let urgency = sizing::shrink_urgency(table.slots[0].used, exp);
    let policy = current_resize_policy();
    if should_act_on(urgency, policy) {
        // `used` is bounded by a capacity this table already allocated
        // successfully, so this can't overflow; bail out rather than
        // panic if it somehow does, since a deferred shrink is harmless.
        let min_exp = match sizing::next_bucket_exp(table.slots[0].used) {
            Some(e) => e,
            None => return,
        };
        let target_exp = min_exp.min(exp.saturating_sub(1));
        if target_exp < exp {
            begin(table, target_exp);
        }
    } else if urgency != ResizeUrgency::None {
        log::trace!("shrink deferred: urgency={urgency:?} policy={policy:?}");
    }
}

fn should_act_on(urgency: ResizeUrgency, policy: ResizePolicy) -> bool {
    match (urgency, policy) {
        (ResizeUrgency::None, _) => false,
        (_, ResizePolicy::Forbid) => false,
        (ResizeUrgency::Soft, ResizePolicy::Avoid) => false,
        (ResizeUrgency::Soft, ResizePolicy::Allow) => true,
        (ResizeUrgency::Hard, ResizePolicy::Allow) | (ResizeUrgency::Hard, ResizePolicy::Avoid) => true,
    }
}
