//! Scaling bloom filter chain.
//!
//! A chain is an ordered sequence of bloom layers. Layer 0 is sized for the
//! reserved capacity and error target; each appended layer multiplies the
//! capacity by the growth factor and the error target by the tightening
//! ratio, so the aggregate false-positive rate stays bounded by
//! `error / (1 - tightening)` no matter how far the chain grows.
//!
//! Inserts always land in the newest layer; older layers are frozen and only
//! consulted by membership checks. Layers are never removed.

use crate::bloom::BloomFilter;
use crate::common::{FilterError, Result};
use crate::common::validation::MAX_FILTERS;
use crate::encoding::{pack_cursor, unpack_cursor, ByteReader};

/// Default geometric capacity multiplier for appended layers.
pub const DEFAULT_GROWTH: u64 = 2;

/// Default per-layer error multiplier for appended layers.
pub const DEFAULT_TIGHTENING: f64 = 0.5;

/// Encoded size of one per-layer parameter record in the header blob.
const LAYER_RECORD_LEN: usize = 8 + 8 + 8 + 4 + 1 + 8 + 8 + 8;

/// Fixed chain-level prefix of the header blob.
const HEADER_PREFIX_LEN: usize = 8 + 8 + 8 + 8;

/// One chain layer: an immutable-geometry bloom filter plus the count of
/// inserts attempted against it.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomLayer {
    filter: BloomFilter,
    size: u64,
}

impl BloomLayer {
    /// The layer's bloom filter.
    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }

    /// Inserts recorded against this layer (monotonic).
    pub fn size(&self) -> u64 {
        self.size
    }

    fn saturated(&self) -> bool {
        self.size >= self.filter.entries()
    }
}

/// Scaling bloom filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingBloom {
    layers: Vec<BloomLayer>,
    size: u64,
    growth: u64,
    tightening: f64,
}

impl ScalingBloom {
    /// Creates a chain with a single layer sized for `capacity` items at the
    /// target `error` rate.
    pub fn new(capacity: u64, error: f64) -> Result<Self> {
        let filter = BloomFilter::new(capacity, error)?;
        Ok(Self {
            layers: vec![BloomLayer { filter, size: 0 }],
            size: 0,
            growth: DEFAULT_GROWTH,
            tightening: DEFAULT_TIGHTENING,
        })
    }

    /// True iff any layer reports the item present.
    pub fn check(&self, item: &[u8]) -> bool {
        self.layers.iter().any(|layer| layer.filter.contains(item))
    }

    /// Adds `item` to the newest layer, growing the chain first when every
    /// layer is saturated. Returns `true` iff the newest layer had not seen
    /// the item's bits before; the "newly added" answer is that layer's view
    /// only, since older layers are never re-consulted on insert.
    ///
    /// A failed growth leaves the chain unchanged.
    pub fn add(&mut self, item: &[u8]) -> Result<bool> {
        if self.layers.iter().all(BloomLayer::saturated) {
            self.grow()?;
        }
        let layer = self.layers.last_mut().expect("chain always has a layer");
        let newly = layer.filter.add(item);
        layer.size += 1;
        self.size += 1;
        Ok(newly)
    }

    fn grow(&mut self) -> Result<()> {
        let last = self.layers.last().expect("chain always has a layer");
        let entries = last.filter.entries().saturating_mul(self.growth);
        let error = last.filter.error() * self.tightening;
        let filter = BloomFilter::new(entries, error).map_err(|_| FilterError::CreateFailed)?;
        tracing::debug!(entries, error, nfilters = self.layers.len() + 1, "bloom chain grew");
        self.layers.push(BloomLayer { filter, size: 0 });
        Ok(())
    }

    /// Total inserts attempted against the chain (monotonic).
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// The layers, oldest first.
    pub fn layers(&self) -> &[BloomLayer] {
        &self.layers
    }

    /// Reassembles a chain from decoded `(filter, attempted-inserts)` layers,
    /// e.g. out of a snapshot. Growth parameters are not part of the
    /// persisted formats and come back as the defaults.
    pub(crate) fn from_layers(layers: Vec<(BloomFilter, u64)>, size: u64) -> Self {
        debug_assert!(!layers.is_empty());
        Self {
            layers: layers
                .into_iter()
                .map(|(filter, size)| BloomLayer { filter, size })
                .collect(),
            size,
            growth: DEFAULT_GROWTH,
            tightening: DEFAULT_TIGHTENING,
        }
    }

    /// Struct sizes plus bit-vector bytes across every layer.
    pub fn mem_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .layers
                .iter()
                .map(|layer| std::mem::size_of::<BloomLayer>() + layer.filter.byte_len())
                .sum::<usize>()
    }

    /// Serializes the chain-level fields and per-layer parameter records:
    /// everything except the bit-vector payloads, which travel as chunks.
    pub fn encoded_header(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_PREFIX_LEN + self.layers.len() * LAYER_RECORD_LEN);
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&(self.layers.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.growth.to_le_bytes());
        buf.extend_from_slice(&self.tightening.to_bits().to_le_bytes());
        for layer in &self.layers {
            let f = &layer.filter;
            buf.extend_from_slice(&f.entries().to_le_bytes());
            buf.extend_from_slice(&f.error().to_bits().to_le_bytes());
            buf.extend_from_slice(&f.bpe().to_bits().to_le_bytes());
            buf.extend_from_slice(&f.hashes().to_le_bytes());
            buf.push(f.n2());
            buf.extend_from_slice(&f.bit_len().to_le_bytes());
            buf.extend_from_slice(&(f.byte_len() as u64).to_le_bytes());
            buf.extend_from_slice(&layer.size.to_le_bytes());
        }
        buf
    }

    /// Rebuilds a chain with zeroed bit vectors from an encoded header.
    /// Chunk loads then overwrite the layer bytes.
    pub fn from_header(buf: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(buf);
        let size = r.u64()?;
        let nfilters = r.u64()?;
        let growth = r.u64()?;
        let tightening = r.f64()?;
        if nfilters == 0 || nfilters > MAX_FILTERS || growth == 0 {
            return Err(FilterError::InvalidHeader);
        }
        if !(tightening > 0.0 && tightening < 1.0) {
            return Err(FilterError::InvalidHeader);
        }

        let mut layers = Vec::with_capacity(nfilters as usize);
        for _ in 0..nfilters {
            let entries = r.u64()?;
            let error = r.f64()?;
            let bpe = r.f64()?;
            let hashes = r.u32()?;
            let n2 = r.u8()?;
            let bits = r.u64()?;
            let bytes = r.u64()?;
            let layer_size = r.u64()?;
            if bytes != bits.div_ceil(8) {
                return Err(FilterError::InvalidHeader);
            }
            let filter = BloomFilter::from_parts(entries, error, bpe, hashes, bits, n2, None)?;
            layers.push(BloomLayer { filter, size: layer_size });
        }
        if !r.is_empty() {
            return Err(FilterError::InvalidHeader);
        }
        Ok(Self { layers, size, growth, tightening })
    }

    /// Returns the next chunk of bit-vector bytes at `cursor`, along with the
    /// cursor for the subsequent read. End of stream is `(0, empty)`. Chunks
    /// never span layers, so a load can always derive the write range from
    /// the returned cursor and the chunk length.
    pub fn encoded_chunk(&self, cursor: u64, max_bytes: usize) -> Result<(u64, &[u8])> {
        if cursor == 0 || max_bytes == 0 {
            return Err(FilterError::InvalidPosition);
        }
        let (mut section, mut offset) = unpack_cursor(cursor);
        loop {
            let Some(layer) = self.layers.get(section as usize) else {
                return Ok((0, &[]));
            };
            let len = layer.filter.byte_len() as u64;
            if offset < len {
                let take = max_bytes.min((len - offset) as usize);
                let start = offset as usize;
                let data = &layer.filter.vec().as_slice()[start..start + take];
                return Ok((pack_cursor(section, offset + take as u64), data));
            }
            if offset > len {
                return Err(FilterError::InvalidPosition);
            }
            section += 1;
            offset = 0;
        }
    }

    /// Writes `bytes` at the range *ending* at `cursor`, the cursor a
    /// matching [`encoded_chunk`](Self::encoded_chunk) call returned next to
    /// these bytes. Fails without mutating on any out-of-range position.
    pub fn load_chunk(&mut self, cursor: u64, bytes: &[u8]) -> Result<()> {
        if cursor == 0 || bytes.is_empty() {
            return Err(FilterError::InvalidPosition);
        }
        let (section, end) = unpack_cursor(cursor);
        let layer = self
            .layers
            .get_mut(section as usize)
            .ok_or(FilterError::InvalidPosition)?;
        let start = end
            .checked_sub(bytes.len() as u64)
            .ok_or(FilterError::InvalidPosition)?;
        if end > layer.filter.byte_len() as u64 {
            return Err(FilterError::InvalidPosition);
        }
        layer.filter.vec_mut().as_mut_slice()[start as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }
}
