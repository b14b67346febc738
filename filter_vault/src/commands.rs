//! Thin command layer mapping the user-facing command surface onto the
//! keyspace contract.
//!
//! Multi/NX/count semantics are explicit parameters or separate entry points
//! here; nothing inspects command-name suffixes. The embedder parses its
//! protocol, calls these functions, and formats the returned [`Reply`] (or
//! the error's `Display` string, which is the exact client-facing message).

use crate::bloom::ScalingBloom;
use crate::common::validation::{validate_capacity, validate_error_rate};
use crate::common::{FilterError, Result};
use crate::config::ModuleConfig;
use crate::cuckoo::{CuckooFilter, CuckooHeader, InsertStatus, BUCKET_SIZE};
use crate::encoding::{CHUNK_ITER_INIT, MAX_CHUNK_BYTES};
use crate::store::{FilterStore, StoredFilter};

/// Reply value of a command, ready for protocol formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple `OK`.
    Ok,
    /// Single integer.
    Int(i64),
    /// Array of integers (multi variants).
    IntArray(Vec<i64>),
    /// Human-readable info lines (debug commands).
    Info(Vec<String>),
    /// A `(cursor, payload)` pair from a scan; `data` is `None` at end of
    /// stream or on an empty filter.
    Chunk {
        /// Cursor to pass to the next scan or load call; `0` means done,
        /// `-1` means the filter was empty.
        cursor: i64,
        /// Chunk payload, if any.
        data: Option<Vec<u8>>,
    },
}

/// `BF.RESERVE key error_rate capacity`: creates an empty bloom chain.
pub fn bf_reserve(store: &mut FilterStore, key: &str, error_rate: f64, capacity: u64) -> Result<Reply> {
    if error_rate == 0.0 || capacity == 0 {
        return Err(FilterError::ZeroReserveArgs);
    }
    validate_error_rate(error_rate)?;
    validate_capacity(capacity)?;
    store.reserve_bloom(key, error_rate, capacity)?;
    Ok(Reply::Ok)
}

/// Shared add path: opens or creates the chain, then adds every item,
/// reporting per-item novelty. `BF.ADD`/`BF.MADD` differ only in arity and
/// reply shape.
pub fn bf_add_many(
    store: &mut FilterStore,
    config: &ModuleConfig,
    key: &str,
    items: &[&[u8]],
) -> Result<Vec<bool>> {
    let chain = store.bloom_or_create(key, config.bloom_capacity, config.error_rate)?;
    items.iter().map(|item| chain.add(item)).collect()
}

/// `BF.ADD key item`: replies 1 when the item was certainly new.
pub fn bf_add(store: &mut FilterStore, config: &ModuleConfig, key: &str, item: &[u8]) -> Result<Reply> {
    let added = bf_add_many(store, config, key, &[item])?;
    Ok(Reply::Int(i64::from(added[0])))
}

/// `BF.MADD key item...`: vectorized add.
pub fn bf_madd(store: &mut FilterStore, config: &ModuleConfig, key: &str, items: &[&[u8]]) -> Result<Reply> {
    let added = bf_add_many(store, config, key, items)?;
    Ok(Reply::IntArray(added.into_iter().map(i64::from).collect()))
}

fn bf_open_for_check<'a>(store: &'a FilterStore, key: &str) -> Result<Option<&'a ScalingBloom>> {
    match store.bloom(key) {
        Ok(chain) => Ok(Some(chain)),
        Err(FilterError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

/// `BF.EXISTS key item`: an absent key answers 0.
pub fn bf_exists(store: &FilterStore, key: &str, item: &[u8]) -> Result<Reply> {
    let present = bf_open_for_check(store, key)?.map(|chain| chain.check(item));
    Ok(Reply::Int(i64::from(present.unwrap_or(false))))
}

/// `BF.MEXISTS key item...`: per-item answers, absent key answers all 0.
pub fn bf_mexists(store: &FilterStore, key: &str, items: &[&[u8]]) -> Result<Reply> {
    let chain = bf_open_for_check(store, key)?;
    Ok(Reply::IntArray(
        items
            .iter()
            .map(|item| i64::from(chain.is_some_and(|c| c.check(item))))
            .collect(),
    ))
}

/// `BF.DEBUG key`: chain size line plus one line per layer.
pub fn bf_info(store: &FilterStore, key: &str) -> Result<Reply> {
    let chain = store.bloom(key)?;
    let mut lines = Vec::with_capacity(1 + chain.num_layers());
    lines.push(format!("size:{}", chain.size()));
    for layer in chain.layers() {
        let f = layer.filter();
        lines.push(format!(
            "bytes:{} bits:{} hashes:{} capacity:{} size:{} ratio:{}",
            f.byte_len(),
            f.bit_len(),
            f.hashes(),
            f.entries(),
            layer.size(),
            f.error(),
        ));
    }
    Ok(Reply::Info(lines))
}

/// `BF.SCANDUMP key cursor`: cursor 0 returns the header together with the
/// initial data cursor; afterwards each call returns one chunk and the next
/// cursor, ending with `(0, none)`.
pub fn bf_scandump(store: &FilterStore, key: &str, cursor: i64) -> Result<Reply> {
    let chain = store.bloom(key)?;
    if cursor < 0 {
        return Err(FilterError::InvalidPosition);
    }
    if cursor == 0 {
        return Ok(Reply::Chunk {
            cursor: CHUNK_ITER_INIT as i64,
            data: Some(chain.encoded_header()),
        });
    }
    let (next, chunk) = chain.encoded_chunk(cursor as u64, MAX_CHUNK_BYTES)?;
    Ok(Reply::Chunk {
        cursor: next as i64,
        data: (!chunk.is_empty()).then(|| chunk.to_vec()),
    })
}

/// `BF.LOADCHUNK key cursor bytes`: cursor 1 against an empty key loads the
/// header and creates the chain; any other cursor overwrites layer bytes.
pub fn bf_loadchunk(store: &mut FilterStore, key: &str, cursor: i64, bytes: &[u8]) -> Result<Reply> {
    if cursor < 0 {
        return Err(FilterError::InvalidPosition);
    }
    let cursor = cursor as u64;
    if cursor == CHUNK_ITER_INIT && store.get(key).is_none() {
        let chain = ScalingBloom::from_header(bytes).inspect_err(|err| {
            tracing::warn!(key, %err, "rejected bloom header load");
        })?;
        store.set(key, StoredFilter::Bloom(chain));
        return Ok(Reply::Ok);
    }
    store.bloom_mut(key)?.load_chunk(cursor, bytes)?;
    Ok(Reply::Ok)
}

/// `CF.RESERVE key capacity`: creates an empty cuckoo filter.
pub fn cf_reserve(store: &mut FilterStore, key: &str, capacity: u64) -> Result<Reply> {
    validate_capacity(capacity)?;
    store.reserve_cuckoo(key, capacity)?;
    Ok(Reply::Ok)
}

/// `CF.ADD key item [capacity]` / `CF.ADDNX ...`: inserts, creating the
/// filter on demand. `unique` selects insert-unique (the NX variant); the
/// optional capacity only applies when the filter is created here.
pub fn cf_add(
    store: &mut FilterStore,
    config: &ModuleConfig,
    key: &str,
    item: &[u8],
    capacity: Option<u64>,
    unique: bool,
) -> Result<Reply> {
    let capacity = capacity.unwrap_or(config.cuckoo_capacity);
    let filter = store.cuckoo_or_create(key, capacity)?;
    let status = if unique {
        filter.insert_unique(item)
    } else {
        filter.insert(item)
    };
    match status {
        InsertStatus::Inserted => Ok(Reply::Int(1)),
        InsertStatus::Exists => Ok(Reply::Int(0)),
        InsertStatus::NoSpace => Err(FilterError::Full),
    }
}

fn cf_open_for_check<'a>(store: &'a FilterStore, key: &str) -> Result<Option<&'a CuckooFilter>> {
    match store.cuckoo(key) {
        Ok(filter) => Ok(Some(filter)),
        Err(FilterError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

/// `CF.EXISTS key item`: an absent key answers 0.
pub fn cf_exists(store: &FilterStore, key: &str, item: &[u8]) -> Result<Reply> {
    let present = cf_open_for_check(store, key)?.map(|filter| filter.check(item));
    Ok(Reply::Int(i64::from(present.unwrap_or(false))))
}

/// `CF.MEXISTS key item...`: answers every item.
pub fn cf_mexists(store: &FilterStore, key: &str, items: &[&[u8]]) -> Result<Reply> {
    let filter = cf_open_for_check(store, key)?;
    Ok(Reply::IntArray(
        items
            .iter()
            .map(|item| i64::from(filter.is_some_and(|f| f.check(item))))
            .collect(),
    ))
}

/// `CF.COUNT key item`: matching-slot multiplicity, 0 on an absent key.
pub fn cf_count(store: &FilterStore, key: &str, item: &[u8]) -> Result<Reply> {
    let count = cf_open_for_check(store, key)?.map_or(0, |filter| filter.count(item));
    Ok(Reply::Int(count as i64))
}

/// `CF.DEL key item`: clears one matching slot; requires the key to exist.
pub fn cf_del(store: &mut FilterStore, key: &str, item: &[u8]) -> Result<Reply> {
    let filter = store.cuckoo_mut(key)?;
    Ok(Reply::Int(i64::from(filter.delete(item))))
}

/// `CF.SCANDUMP key cursor`: data chunks only (the header travels through
/// `CF.LOADHDR`). An empty filter answers `(-1, none)` immediately.
pub fn cf_scandump(store: &FilterStore, key: &str, cursor: i64) -> Result<Reply> {
    let filter = store.cuckoo(key)?;
    if cursor < 0 {
        return Err(FilterError::InvalidPosition);
    }
    if filter.num_items() == 0 {
        return Ok(Reply::Chunk { cursor: -1, data: None });
    }
    let (next, chunk) = filter.encoded_chunk(cursor as u64, MAX_CHUNK_BYTES)?;
    Ok(Reply::Chunk {
        cursor: next as i64,
        data: (!chunk.is_empty()).then(|| chunk.to_vec()),
    })
}

/// `CF.LOADHDR key bytes`: creates the filter from its fixed-size header;
/// the key must be empty and the blob exactly header-sized.
pub fn cf_loadhdr(store: &mut FilterStore, key: &str, bytes: &[u8]) -> Result<Reply> {
    match store.get(key) {
        Some(StoredFilter::Cuckoo(_)) => return Err(FilterError::AlreadyExists),
        Some(_) => return Err(FilterError::WrongType),
        None => {}
    }
    let header = CuckooHeader::from_bytes(bytes)?;
    let filter = CuckooFilter::from_header(&header).inspect_err(|err| {
        tracing::warn!(key, %err, "rejected cuckoo header load");
    })?;
    store.set(key, StoredFilter::Cuckoo(filter));
    Ok(Reply::Ok)
}

/// `CF.LOADCHUNK key cursor bytes`: overwrites bucket bytes at the range a
/// matching scan produced.
pub fn cf_loadchunk(store: &mut FilterStore, key: &str, cursor: i64, bytes: &[u8]) -> Result<Reply> {
    if cursor < 0 {
        return Err(FilterError::InvalidPosition);
    }
    store.cuckoo_mut(key)?.load_chunk(cursor as u64, bytes)?;
    Ok(Reply::Ok)
}

/// `CF.DEBUG key`: geometry and counter summary.
pub fn cf_info(store: &FilterStore, key: &str) -> Result<Reply> {
    let filter = store.cuckoo(key)?;
    Ok(Reply::Info(vec![format!(
        "bktsize:{} buckets:{} items:{} deletes:{} filters:{}",
        BUCKET_SIZE,
        filter.num_buckets(),
        filter.num_items(),
        filter.num_deletes(),
        filter.num_filters(),
    )]))
}
