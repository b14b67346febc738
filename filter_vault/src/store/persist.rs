//! Snapshot save/load and rewrite emission for stored filters.
//!
//! Snapshots use the record-oriented [`RdbWriter`]/[`RdbReader`] primitives
//! and are versioned with `encver`. Rewrite emission turns a live filter into
//! the command sequence that rebuilds it byte-for-byte through the chunk
//! protocol.

use crate::bloom::{BloomFilter, ScalingBloom};
use crate::common::validation::MAX_FILTERS;
use crate::common::{FilterError, Result};
use crate::cuckoo::CuckooFilter;
use crate::encoding::{RdbReader, RdbWriter, CHUNK_ITER_INIT, ENCODING_VERSION, MAX_CHUNK_BYTES};
use crate::store::StoredFilter;

/// Which of the two stored-value types a snapshot payload belongs to. The
/// host records this per key; it is not part of the payload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Scaling bloom filter chain.
    Bloom,
    /// Cuckoo filter.
    Cuckoo,
}

/// One command of a rewrite stream: replaying these against an empty key
/// reconstructs the filter exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AofCommand {
    /// Command name (`BF.LOADCHUNK`, `CF.LOADHDR`, `CF.LOADCHUNK`).
    pub command: &'static str,
    /// Target key.
    pub key: String,
    /// Chunk cursor, absent for the cuckoo header command.
    pub cursor: Option<i64>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl StoredFilter {
    /// This value's snapshot type tag.
    pub fn value_type(&self) -> ValueType {
        match self {
            StoredFilter::Bloom(_) => ValueType::Bloom,
            StoredFilter::Cuckoo(_) => ValueType::Cuckoo,
        }
    }

    /// Serializes the value into `io` using the current encoding version.
    pub fn rdb_save(&self, io: &mut RdbWriter) {
        match self {
            StoredFilter::Bloom(chain) => save_bloom(chain, io),
            StoredFilter::Cuckoo(filter) => save_cuckoo(filter, io),
        }
    }

    /// Deserializes a value of the given type written by encoding version
    /// `encver`. Versions newer than [`ENCODING_VERSION`] fail.
    pub fn rdb_load(vtype: ValueType, io: &mut RdbReader<'_>, encver: u32) -> Result<Self> {
        if encver > ENCODING_VERSION {
            return Err(FilterError::UnsupportedVersion(encver));
        }
        match vtype {
            ValueType::Bloom => Ok(StoredFilter::Bloom(load_bloom(io, encver)?)),
            ValueType::Cuckoo => Ok(StoredFilter::Cuckoo(load_cuckoo(io)?)),
        }
    }

    /// Emits the rewrite command stream reconstructing this value.
    pub fn aof_rewrite(&self, key: &str) -> Vec<AofCommand> {
        match self {
            StoredFilter::Bloom(chain) => rewrite_bloom(key, chain),
            StoredFilter::Cuckoo(filter) => rewrite_cuckoo(key, filter),
        }
    }
}

fn save_bloom(chain: &ScalingBloom, io: &mut RdbWriter) {
    io.save_unsigned(chain.size());
    io.save_unsigned(chain.num_layers() as u64);
    for layer in chain.layers() {
        let f = layer.filter();
        io.save_unsigned(f.entries());
        io.save_double(f.error());
        io.save_unsigned(u64::from(f.hashes()));
        io.save_double(f.bpe());
        io.save_unsigned(f.bit_len());
        io.save_unsigned(u64::from(f.n2()));
        io.save_bytes(f.vec().as_slice());
        io.save_unsigned(layer.size());
    }
}

fn load_bloom(io: &mut RdbReader<'_>, encver: u32) -> Result<ScalingBloom> {
    let size = io.load_unsigned()?;
    let nfilters = io.load_unsigned()?;
    if nfilters == 0 || nfilters > MAX_FILTERS {
        return Err(FilterError::InvalidHeader);
    }

    let mut layers = Vec::with_capacity(nfilters as usize);
    for _ in 0..nfilters {
        let entries = io.load_unsigned()?;
        let error = io.load_double()?;
        let hashes = u32::try_from(io.load_unsigned()?).map_err(|_| FilterError::InvalidHeader)?;
        let bpe = io.load_double()?;
        let (bits, n2) = if encver == 0 {
            // legacy payloads carry no sizing fields; recompute and fall back
            // to the non-mask index path
            ((entries as f64 * bpe) as u64, 0u8)
        } else {
            let bits = io.load_unsigned()?;
            let n2 = u8::try_from(io.load_unsigned()?).map_err(|_| FilterError::InvalidHeader)?;
            (bits, n2)
        };
        let data = io.load_bytes()?;
        let layer_size = io.load_unsigned()?;
        let filter = BloomFilter::from_parts(entries, error, bpe, hashes, bits, n2, Some(data))?;
        layers.push((filter, layer_size));
    }
    Ok(ScalingBloom::from_layers(layers, size))
}

fn save_cuckoo(filter: &CuckooFilter, io: &mut RdbWriter) {
    io.save_unsigned(filter.num_filters() as u64);
    io.save_unsigned(filter.num_buckets());
    io.save_unsigned(filter.num_items());
    for buf in filter.sub_filter_bytes() {
        io.save_bytes(buf);
    }
}

fn load_cuckoo(io: &mut RdbReader<'_>) -> Result<CuckooFilter> {
    let num_filters = io.load_unsigned()?;
    let num_buckets = io.load_unsigned()?;
    let num_items = io.load_unsigned()?;
    if num_filters == 0 || num_filters > MAX_FILTERS {
        return Err(FilterError::InvalidHeader);
    }
    let mut buffers = Vec::with_capacity(num_filters as usize);
    for _ in 0..num_filters {
        buffers.push(io.load_bytes()?);
    }
    CuckooFilter::from_sub_filter_bytes(num_buckets, num_items, buffers)
}

fn rewrite_bloom(key: &str, chain: &ScalingBloom) -> Vec<AofCommand> {
    let mut commands = vec![AofCommand {
        command: "BF.LOADCHUNK",
        key: key.to_owned(),
        cursor: Some(CHUNK_ITER_INIT as i64),
        payload: chain.encoded_header(),
    }];
    let mut cursor = CHUNK_ITER_INIT;
    loop {
        let Ok((next, chunk)) = chain.encoded_chunk(cursor, MAX_CHUNK_BYTES) else {
            break;
        };
        if chunk.is_empty() {
            break;
        }
        commands.push(AofCommand {
            command: "BF.LOADCHUNK",
            key: key.to_owned(),
            cursor: Some(next as i64),
            payload: chunk.to_vec(),
        });
        cursor = next;
    }
    commands
}

fn rewrite_cuckoo(key: &str, filter: &CuckooFilter) -> Vec<AofCommand> {
    let mut commands = vec![AofCommand {
        command: "CF.LOADHDR",
        key: key.to_owned(),
        cursor: None,
        payload: filter.header().to_bytes().to_vec(),
    }];
    let mut cursor = CHUNK_ITER_INIT;
    loop {
        let Ok((next, chunk)) = filter.encoded_chunk(cursor, MAX_CHUNK_BYTES) else {
            break;
        };
        if chunk.is_empty() {
            break;
        }
        commands.push(AofCommand {
            command: "CF.LOADCHUNK",
            key: key.to_owned(),
            cursor: Some(next as i64),
            payload: chunk.to_vec(),
        });
        cursor = next;
    }
    commands
}
