//! The type descriptor: the callback v-table that tells a [`crate::table::Table`]
//! how to hash, compare, and destroy the elements it holds.
//!
//! spec.md models this as a struct of function pointers, any of which may
//! be absent, with defaults filling the gap (hash falls back to a seeded
//! SipHash, compare falls back to identity). The safe-Rust rendition of
//! "element is its own key" / "default hash" is a compile-time trait
//! (`Keyed`) rather than an `Option<fn(...)>` for the key-extraction path
//! specifically, because the key's *type* has to be known statically for
//! `find`/`delete` to accept a `&Key` argument at all. Everything that
//! stays genuinely optional at construction time (a custom hash, a custom
//! equality, destruction and rehash-lifecycle hooks) remains a runtime
//! callback field, matching the teacher's preference for plain structs of
//! closures over a trait-object hierarchy.

use std::hash::Hash;

/// Types storable in a [`crate::table::Table`] must be able to produce the
/// key they're looked up by. For the common case where the element *is*
/// the key, implement this as `type Key = Self; fn key(&self) -> &Self { self }`.
pub trait Keyed {
    type Key: Eq + Hash + ?Sized;

    fn key(&self) -> &Self::Key;
}

/// The callback v-table for a table. `hash_fn`/`key_eq_fn` default to a
/// seeded SipHash and `Eq`, respectively, when left `None`; the lifecycle
/// hooks default to no-ops.
pub struct TypeDescriptor<T: Keyed> {
    pub(crate) hash_fn: Option<Box<dyn Fn(&T::Key) -> u64>>,
    pub(crate) key_eq_fn: Option<Box<dyn Fn(&T::Key, &T::Key) -> bool>>,
    pub(crate) destructor: Option<Box<dyn FnMut(T)>>,
    pub(crate) rehashing_started: Option<Box<dyn FnMut()>>,
    pub(crate) rehashing_completed: Option<Box<dyn FnMut()>>,
    pub(crate) metadata_size: usize,
}

impl<T: Keyed> Default for TypeDescriptor<T> {
    fn default() -> Self {
        TypeDescriptor {
            hash_fn: None,
            key_eq_fn: None,
            destructor: None,
            rehashing_started: None,
            rehashing_completed: None,
            metadata_size: 0,
        }
    }
}

impl<T: Keyed> TypeDescriptor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the default seeded-SipHash hash function.
    pub fn with_hash_fn(mut self, f: impl Fn(&T::Key) -> u64 + 'static) -> Self {
        self.hash_fn = Some(Box::new(f));
        self
    }

    /// Override the default `Eq`-based key comparison.
    pub fn with_key_eq_fn(mut self, f: impl Fn(&T::Key, &T::Key) -> bool + 'static) -> Self {
        self.key_eq_fn = Some(Box::new(f));
        self
    }

    /// Run `f` on an element at the moment it leaves the table (deletion,
    /// replacement, or table release), instead of only dropping it.
    pub fn with_destructor(mut self, f: impl FnMut(T) + 'static) -> Self {
        self.destructor = Some(Box::new(f));
        self
    }

    pub fn with_rehashing_started(mut self, f: impl FnMut() + 'static) -> Self {
        self.rehashing_started = Some(Box::new(f));
        self
    }

    pub fn with_rehashing_completed(mut self, f: impl FnMut() + 'static) -> Self {
        self.rehashing_completed = Some(Box::new(f));
        self
    }

    /// Reserve `size` bytes of out-of-band metadata, addressable via
    /// `Table::metadata`/`Table::metadata_mut`.
    pub fn with_metadata_size(mut self, size: usize) -> Self {
        self.metadata_size = size;
        self
    }

    pub(crate) fn hash(&self, seed: [u8; 16], key: &T::Key) -> u64 {
        match &self.hash_fn {
            Some(f) => f(key),
            None => crate::hash::seeded_hash(seed, key),
        }
    }

    pub(crate) fn key_eq(&self, a: &T::Key, b: &T::Key) -> bool {
        match &self.key_eq_fn {
            Some(f) => f(a, b),
            None => a == b,
        }
    }

    pub(crate) fn destroy(&mut self, elem: T) {
        match &mut self.destructor {
            Some(f) => f(elem),
            None => drop(elem),
        }
    }

    pub(crate) fn notify_rehashing_started(&mut self) {
        if let Some(f) = &mut self.rehashing_started {
            f();
        }
    }

    pub(crate) fn notify_rehashing_completed(&mut self) {
        if let Some(f) = &mut self.rehashing_completed {
            f();
        }
    }
}
