//! Single bloom filter layer.
//!
//! Sizing follows the classic formulas: `bpe = -ln(error) / ln(2)^2` bits per
//! entry, `bits = ceil(entries * bpe)` (rounded up to a power of two for the
//! mask fast path), `hashes = max(1, ceil(ln(2) * bpe))`. Probing uses
//! Kirsch–Mitzenmacher double hashing so only two base hashes are computed
//! per operation.

use std::f64::consts::LN_2;

use crate::bloom::BitVector;
use crate::common::hash::double_hash;
use crate::common::validation::{validate_capacity, validate_error_rate};
use crate::common::{FilterError, Result};

/// One bloom filter over a bit vector. Sizing parameters are fixed at
/// construction; only the bits mutate afterwards.
#[derive(Clone, PartialEq)]
pub struct BloomFilter {
    vec: BitVector,
    entries: u64,
    error: f64,
    bpe: f64,
    hashes: u32,
}

impl BloomFilter {
    /// Creates a filter sized for `entries` items at the target `error` rate,
    /// with the bit count rounded up to a power of two.
    pub fn new(entries: u64, error: f64) -> Result<Self> {
        Self::with_options(entries, error, true)
    }

    /// Creates a filter, optionally rounding the bit count up to the next
    /// power of two to enable mask indexing.
    pub fn with_options(entries: u64, error: f64, fast_path: bool) -> Result<Self> {
        validate_capacity(entries)?;
        validate_error_rate(error)?;

        let bpe = -error.ln() / (LN_2 * LN_2);
        let hashes = ((LN_2 * bpe).ceil() as u32).max(1);
        let raw_bits = ((entries as f64) * bpe).ceil() as u64;
        let (bits, n2) = if fast_path {
            let bits = raw_bits.next_power_of_two();
            (bits, bits.trailing_zeros() as u8)
        } else {
            (raw_bits, 0)
        };

        Ok(Self {
            vec: BitVector::new(bits, n2),
            entries,
            error,
            bpe,
            hashes,
        })
    }

    /// Rebuilds a layer from decoded parameters. `data`, when present, is the
    /// persisted bit-vector payload; otherwise the vector starts zeroed and
    /// is filled by chunk loads.
    pub(crate) fn from_parts(
        entries: u64,
        error: f64,
        bpe: f64,
        hashes: u32,
        bits: u64,
        n2: u8,
        data: Option<Vec<u8>>,
    ) -> Result<Self> {
        if entries == 0 || hashes == 0 || hashes > 255 {
            return Err(FilterError::InvalidHeader);
        }
        if !(error > 0.0 && error < 1.0) || !(bpe > 0.0) {
            return Err(FilterError::InvalidHeader);
        }
        let vec = match data {
            Some(bytes) => BitVector::from_raw(bytes, bits, n2)?,
            None => {
                if bits == 0 || (n2 != 0 && (n2 > 63 || bits != 1 << n2)) {
                    return Err(FilterError::InvalidHeader);
                }
                BitVector::new(bits, n2)
            }
        };
        Ok(Self { vec, entries, error, bpe, hashes })
    }

    /// Sets all probe bits for `item`; returns `true` iff any bit was
    /// previously unset, i.e. the item was certainly absent before this call.
    pub fn add(&mut self, item: &[u8]) -> bool {
        let (h1, h2) = double_hash(item);
        let mut newly = false;
        for i in 0..u64::from(self.hashes) {
            newly |= self.vec.set(h1.wrapping_add(i.wrapping_mul(h2)));
        }
        newly
    }

    /// Tests all probe bits; `false` means definitely absent.
    pub fn contains(&self, item: &[u8]) -> bool {
        let (h1, h2) = double_hash(item);
        (0..u64::from(self.hashes)).all(|i| self.vec.get(h1.wrapping_add(i.wrapping_mul(h2))))
    }

    /// Target capacity in items.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Target false-positive rate for this layer.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Bits per entry derived from the error target.
    pub fn bpe(&self) -> f64 {
        self.bpe
    }

    /// Number of probe hashes.
    pub fn hashes(&self) -> u32 {
        self.hashes
    }

    /// Bit-vector length in bits.
    pub fn bit_len(&self) -> u64 {
        self.vec.bit_len()
    }

    /// Bit-vector length in bytes.
    pub fn byte_len(&self) -> usize {
        self.vec.byte_len()
    }

    /// Log2 of the bit count when mask indexing applies, else 0.
    pub fn n2(&self) -> u8 {
        self.vec.n2()
    }

    pub(crate) fn vec(&self) -> &BitVector {
        &self.vec
    }

    pub(crate) fn vec_mut(&mut self) -> &mut BitVector {
        &mut self.vec
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("entries", &self.entries)
            .field("error", &self.error)
            .field("hashes", &self.hashes)
            .field("bits", &self.vec.bit_len())
            .field("n2", &self.vec.n2())
            .finish()
    }
}
