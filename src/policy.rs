//! Process-wide singletons: the resize policy gate and the hash seed.
//!
//! Both are process-global by design (spec.md §5): a single process
//! embedding this crate is expected to set them once, early, and leave
//! them alone — not per-table configuration.

use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

pub use crate::sizing::ResizePolicy;

static RESIZE_POLICY: AtomicU8 = AtomicU8::new(ResizePolicy::Allow as u8);
static HASH_SEED: Lazy<RwLock<[u8; 16]>> = Lazy::new(|| RwLock::new([0u8; 16]));

/// Set the seed used by the default hash function for every table created
/// after this call. Tables already constructed keep hashing with whatever
/// seed was active at their creation (the seed is copied into the table,
/// not read live on every hash) so that a running table's bucket
/// placement never silently shifts underneath it.
pub fn set_hash_seed(seed: [u8; 16]) {
    *HASH_SEED.write() = seed;
}

/// The seed currently in effect, as would be captured by a table created
/// right now.
pub(crate) fn current_hash_seed() -> [u8; 16] {
    *HASH_SEED.read()
}

/// Set the process-wide resize policy gate.
pub fn set_resize_policy(policy: ResizePolicy) {
    RESIZE_POLICY.store(policy as u8, Ordering::Relaxed);
}

pub(crate) fn current_resize_policy() -> ResizePolicy {
    match RESIZE_POLICY.load(Ordering::Relaxed) {
        0 => ResizePolicy::Allow,
        1 => ResizePolicy::Avoid,
        2 => ResizePolicy::Forbid,
        other => unreachable!("resize policy byte out of range: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_seed_round_trips() {
        let seed = [9u8; 16];
        set_hash_seed(seed);
        assert_eq!(current_hash_seed(), seed);
        set_hash_seed([0u8; 16]);
    }

    #[test]
    fn resize_policy_round_trips() {
        set_resize_policy(ResizePolicy::Avoid);
        assert_eq!(current_resize_policy(), ResizePolicy::Avoid);
        set_resize_policy(ResizePolicy::Allow);
        assert_eq!(current_resize_policy(), ResizePolicy::Allow);
    }
}
