//! Error types for filter operations.
//!
//! The `Display` text of each variant is the exact reply string the command
//! layer surfaces to clients, so embedders can format errors with `to_string`.

use thiserror::Error;

/// Errors surfaced by the filter engines, the keyspace, and the command layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// The operation requires an existing filter but the key is empty.
    #[error("ERR not found")]
    NotFound,

    /// The key exists but holds a value of a different type.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// A reserve was issued against a key that already holds a filter.
    #[error("ERR item exists")]
    AlreadyExists,

    /// The error rate is not a probability in the open interval (0, 1).
    #[error("ERR bad error rate")]
    BadErrorRate,

    /// The capacity is zero or too large to address.
    #[error("ERR bad capacity")]
    BadCapacity,

    /// Reserve arguments parsed but one of them is zero.
    #[error("ERR capacity and error must not be 0")]
    ZeroReserveArgs,

    /// Cuckoo insertion failed even after appending a fresh sub-filter.
    #[error("Filter is full")]
    Full,

    /// A filter could not be constructed (create or grow).
    #[error("Couldn't create filter")]
    CreateFailed,

    /// A chunk cursor does not address a valid byte range.
    #[error("Invalid position")]
    InvalidPosition,

    /// A header or snapshot blob is malformed, truncated, or inconsistent.
    #[error("Invalid header")]
    InvalidHeader,

    /// A persisted payload was written by a newer encoding version.
    #[error("ERR unsupported encoding version {0}")]
    UnsupportedVersion(u32),

    /// A module-load configuration argument was rejected.
    #[error("{0}")]
    BadConfig(String),
}

/// Result type alias for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
