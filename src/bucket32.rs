//! Bucket layout for 32-bit targets: 12 element slots per 64-byte bucket.
//!
//! Layout (repr(C)): `meta` (2 bytes: bit 15 = everfull, bits 0..=11 =
//! presence, bits 12..=14 unused) + `hashes` (12 bytes) + two bytes of
//! compiler-inserted alignment padding in front of `elements` (12 bytes ->
//! 4-byte alignment requires the gap) + `elements` (12 pointer-sized slots,
//! 4 bytes each). 2 + 12 + 2 + 48 = 64.

pub const ELEMENTS_PER_BUCKET: usize = 12;
pub const BUCKET_FACTOR: usize = 3;
pub const BUCKET_DIVISOR: usize = 16;

pub type Meta = u16;
pub const EVERFULL_BIT: Meta = 0b1000_0000_0000_0000;
pub const PRESENCE_MASK: Meta = 0b0000_1111_1111_1111;

#[repr(C)]
pub struct Bucket<T> {
    pub(crate) meta: Meta,
    pub(crate) hashes: [u8; ELEMENTS_PER_BUCKET],
    pub(crate) elements: [*mut T; ELEMENTS_PER_BUCKET],
}

const _: () = assert!(core::mem::size_of::<Bucket<()>>() == 64);
