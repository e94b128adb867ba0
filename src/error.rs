use thiserror::Error;

/// The only fallible path through the table: allocation failure.
///
/// Every other operational outcome (duplicate key, not found) is encoded in
/// the return value of the corresponding method, not as an `Err`. Usage
/// violations (operating on a table from the wrong context, mutating during
/// a scan callback) are programming errors and are caught with
/// `debug_assert!`/`assert!` instead of surfacing here.
#[derive(Error, Debug)]
pub enum HashtabError {
    #[error("allocation failed for a table of {buckets} buckets")]
    OutOfMemory { buckets: usize },
}

pub type Result<T> = std::result::Result<T, HashtabError>;
