//! filter_vault: approximate set membership as key-addressable server values.
//!
//! Two filter engines, a scaling bloom filter chain and a cuckoo filter,
//! stored under named keys, with a chunked binary encoding for client-driven
//! dump/load, snapshot persistence, and rewrite streams.
//!
//! # Example
//!
//! ```
//! use filter_vault::{commands, FilterStore, ModuleConfig, Reply};
//!
//! let mut store = FilterStore::new();
//! let config = ModuleConfig::default();
//!
//! commands::bf_reserve(&mut store, "visitors", 0.01, 100).unwrap();
//! assert_eq!(commands::bf_add(&mut store, &config, "visitors", b"alice").unwrap(), Reply::Int(1));
//! assert_eq!(commands::bf_add(&mut store, &config, "visitors", b"alice").unwrap(), Reply::Int(0));
//! assert_eq!(commands::bf_exists(&store, "visitors", b"alice").unwrap(), Reply::Int(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bloom;
pub mod commands;
pub mod common;
pub mod config;
pub mod cuckoo;
pub mod encoding;
pub mod store;

// Re-export core types for convenience
pub use bloom::{BloomFilter, ScalingBloom};
pub use commands::Reply;
pub use common::{FilterError, Result};
pub use config::ModuleConfig;
pub use cuckoo::{CuckooFilter, CuckooHeader, InsertStatus};
pub use encoding::{RdbReader, RdbWriter, ENCODING_VERSION, MAX_CHUNK_BYTES};
pub use store::{AofCommand, FilterStore, StoredFilter, ValueType};
