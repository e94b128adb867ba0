//! Default seeded hash function, used when a type descriptor doesn't
//! supply its own `hash_fn`.

use std::hash::{Hash, Hasher};

use siphasher::sip::SipHasher13;

/// SipHash-1-3 keyed by the process-wide seed (see [`crate::policy`]).
/// SipHash-1-3 trades a little DoS resistance against the full
/// SipHash-2-4 for speed; this is the same tradeoff Redis makes for its
/// default hash function.
pub(crate) fn seeded_hash<K: Hash + ?Sized>(seed: [u8; 16], key: &K) -> u64 {
    let mut hasher = SipHasher13::new_with_key(&seed);
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_key_is_stable() {
        let seed = [7u8; 16];
        assert_eq!(seeded_hash(seed, "hello"), seeded_hash(seed, "hello"));
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = seeded_hash([1u8; 16], "hello");
        let b = seeded_hash([2u8; 16], "hello");
        assert_ne!(a, b);
    }
}
