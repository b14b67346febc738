//! Keyed filter store and stored-value dispatch.
//!
//! The host server owns the real keyspace; this module models the contract
//! the filters need from it: typed lookup, create-if-absent, reserve, delete,
//! and the uniform capability surface (snapshot save/load, rewrite emission,
//! memory accounting) the host invokes through its per-type method table.
//! That method table becomes a two-variant enum here.

mod persist;

use std::collections::HashMap;

use crate::bloom::ScalingBloom;
use crate::common::{FilterError, Result};
use crate::cuckoo::CuckooFilter;

pub use persist::{AofCommand, ValueType};

/// A value stored under a key: one of the two filter types.
#[derive(Debug, Clone)]
pub enum StoredFilter {
    /// A scaling bloom filter chain.
    Bloom(ScalingBloom),
    /// A cuckoo filter.
    Cuckoo(CuckooFilter),
}

impl StoredFilter {
    /// Struct sizes plus bit-vector / bucket-array bytes.
    pub fn mem_usage(&self) -> usize {
        match self {
            StoredFilter::Bloom(chain) => chain.mem_usage(),
            StoredFilter::Cuckoo(filter) => filter.mem_usage(),
        }
    }
}

/// In-process keyed map from name to filter. Distinct keys are independent;
/// the host serializes all commands touching one key, so no interior locking
/// is needed here.
#[derive(Debug, Default)]
pub struct FilterStore {
    entries: HashMap<String, StoredFilter>,
}

impl FilterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lookup, untyped.
    pub fn get(&self, key: &str) -> Option<&StoredFilter> {
        self.entries.get(key)
    }

    /// Opens an existing bloom chain.
    pub fn bloom(&self, key: &str) -> Result<&ScalingBloom> {
        match self.entries.get(key) {
            None => Err(FilterError::NotFound),
            Some(StoredFilter::Bloom(chain)) => Ok(chain),
            Some(_) => Err(FilterError::WrongType),
        }
    }

    /// Opens an existing bloom chain for mutation.
    pub fn bloom_mut(&mut self, key: &str) -> Result<&mut ScalingBloom> {
        match self.entries.get_mut(key) {
            None => Err(FilterError::NotFound),
            Some(StoredFilter::Bloom(chain)) => Ok(chain),
            Some(_) => Err(FilterError::WrongType),
        }
    }

    /// Opens an existing cuckoo filter.
    pub fn cuckoo(&self, key: &str) -> Result<&CuckooFilter> {
        match self.entries.get(key) {
            None => Err(FilterError::NotFound),
            Some(StoredFilter::Cuckoo(filter)) => Ok(filter),
            Some(_) => Err(FilterError::WrongType),
        }
    }

    /// Opens an existing cuckoo filter for mutation.
    pub fn cuckoo_mut(&mut self, key: &str) -> Result<&mut CuckooFilter> {
        match self.entries.get_mut(key) {
            None => Err(FilterError::NotFound),
            Some(StoredFilter::Cuckoo(filter)) => Ok(filter),
            Some(_) => Err(FilterError::WrongType),
        }
    }

    /// Creates an empty bloom chain under `key`. Fails with `AlreadyExists`
    /// when the key holds a bloom chain, `WrongType` when it holds anything
    /// else; the stored value is untouched in both cases.
    pub fn reserve_bloom(&mut self, key: &str, error: f64, capacity: u64) -> Result<()> {
        match self.entries.get(key) {
            Some(StoredFilter::Bloom(_)) => return Err(FilterError::AlreadyExists),
            Some(_) => return Err(FilterError::WrongType),
            None => {}
        }
        let chain = ScalingBloom::new(capacity, error)?;
        tracing::debug!(key, capacity, error, "reserved bloom chain");
        self.entries.insert(key.to_owned(), StoredFilter::Bloom(chain));
        Ok(())
    }

    /// Creates an empty cuckoo filter under `key`; same conflict rules as
    /// [`reserve_bloom`](Self::reserve_bloom).
    pub fn reserve_cuckoo(&mut self, key: &str, capacity: u64) -> Result<()> {
        match self.entries.get(key) {
            Some(StoredFilter::Cuckoo(_)) => return Err(FilterError::AlreadyExists),
            Some(_) => return Err(FilterError::WrongType),
            None => {}
        }
        let filter = CuckooFilter::new(capacity)?;
        tracing::debug!(key, capacity, "reserved cuckoo filter");
        self.entries.insert(key.to_owned(), StoredFilter::Cuckoo(filter));
        Ok(())
    }

    /// Opens the bloom chain under `key`, creating it with the given defaults
    /// when the key is empty.
    pub fn bloom_or_create(&mut self, key: &str, capacity: u64, error: f64) -> Result<&mut ScalingBloom> {
        if !self.entries.contains_key(key) {
            let chain = ScalingBloom::new(capacity, error).map_err(|_| FilterError::CreateFailed)?;
            tracing::debug!(key, capacity, error, "created bloom chain on demand");
            self.entries.insert(key.to_owned(), StoredFilter::Bloom(chain));
        }
        self.bloom_mut(key)
    }

    /// Opens the cuckoo filter under `key`, creating it with the given
    /// capacity when the key is empty.
    pub fn cuckoo_or_create(&mut self, key: &str, capacity: u64) -> Result<&mut CuckooFilter> {
        if !self.entries.contains_key(key) {
            let filter = CuckooFilter::new(capacity).map_err(|_| FilterError::CreateFailed)?;
            tracing::debug!(key, capacity, "created cuckoo filter on demand");
            self.entries.insert(key.to_owned(), StoredFilter::Cuckoo(filter));
        }
        self.cuckoo_mut(key)
    }

    /// Stores a fully-built value under `key` (header loads, snapshot loads).
    pub fn set(&mut self, key: &str, value: StoredFilter) {
        self.entries.insert(key.to_owned(), value);
    }

    /// Drops the value under `key`. Returns whether a value existed; dropping
    /// releases everything and repeating is a no-op.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        if existed {
            tracing::debug!(key, "deleted filter");
        }
        existed
    }

    /// Memory footprint of the value under `key`.
    pub fn mem_usage(&self, key: &str) -> Result<usize> {
        self.entries
            .get(key)
            .map(StoredFilter::mem_usage)
            .ok_or(FilterError::NotFound)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
