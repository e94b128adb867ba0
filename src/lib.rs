//! A single-threaded, open-addressing hash table with cache-line-sized
//! buckets, incremental two-table rehashing, and a stateless reverse-bit
//! cursor scan.
//!
//! The table stores a caller-chosen element type `T` that knows how to
//! produce its own lookup key (see [`descriptor::Keyed`]); hashing,
//! equality, destruction, and rehash-lifecycle notification are all
//! pluggable through a [`descriptor::TypeDescriptor`], defaulting to a
//! process-wide seeded SipHash and `Eq` when left unset.
//!
//! ```
//! use hashtab::{Keyed, Table, TypeDescriptor};
//!
//! struct Entry {
//!     key: String,
//!     value: u64,
//! }
//!
//! impl Keyed for Entry {
//!     type Key = String;
//!     fn key(&self) -> &String {
//!         &self.key
//!     }
//! }
//!
//! let mut table: Table<Entry> = Table::new(TypeDescriptor::new());
//! table
//!     .add(Entry { key: "a".into(), value: 1 })
//!     .ok()
//!     .unwrap();
//! assert_eq!(table.find(&"a".to_string()).map(|e| e.value), Some(1));
//! ```

mod bucket;
#[cfg(feature = "debug-tools")]
mod debug;
pub mod descriptor;
pub mod error;
mod hash;
pub mod policy;
mod probe;
mod rehash;
mod scan;
mod sizing;
mod table;

pub use bucket::{BUCKET_DIVISOR, BUCKET_FACTOR, ELEMENTS_PER_BUCKET};
pub use descriptor::{Keyed, TypeDescriptor};
pub use error::{HashtabError, Result};
pub use policy::ResizePolicy;
pub use table::{AddOutcome, Table};
