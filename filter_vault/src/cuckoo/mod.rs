//! Cuckoo filter: fingerprint-based membership with deletion support.

mod filter;

pub use filter::{CuckooFilter, CuckooHeader, InsertStatus, BUCKET_SIZE};
