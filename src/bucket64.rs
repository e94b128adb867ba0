//! Bucket layout for 64-bit targets: 7 element slots per 64-byte bucket.
//!
//! Layout (repr(C), no explicit padding needed — the natural alignment of
//! the `elements` pointer array already lands the struct at exactly 64
//! bytes): `meta` (1 byte: bit 7 = everfull, bits 0..=6 = presence) +
//! `hashes` (7 bytes) + `elements` (7 pointer-sized slots).

pub const ELEMENTS_PER_BUCKET: usize = 7;
pub const BUCKET_FACTOR: usize = 3;
pub const BUCKET_DIVISOR: usize = 16;

pub type Meta = u8;
pub const EVERFULL_BIT: Meta = 0b1000_0000;
pub const PRESENCE_MASK: Meta = 0b0111_1111;

#[repr(C)]
pub struct Bucket<T> {
    pub(crate) meta: Meta,
    pub(crate) hashes: [u8; ELEMENTS_PER_BUCKET],
    pub(crate) elements: [*mut T; ELEMENTS_PER_BUCKET],
}

const _: () = assert!(core::mem::size_of::<Bucket<()>>() == 64);
