//! Cuckoo filter with random-walk insertion and grow-on-fail sub-filters.
//!
//! Each item maps to an 8-bit fingerprint and two candidate buckets related
//! by `alt(i, fp) = (i ^ hash(fp)) & mask`, an involution, so either bucket
//! recovers the other from the stored fingerprint alone. When a random-walk
//! insertion exhausts its kick budget in every sub-filter, a fresh sub-filter
//! with identical geometry is appended and the insert retried there, so the
//! filter keeps absorbing items past its nominal capacity at a modest
//! lookup-cost penalty.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::common::hash::{alt_hash, item_hash};
use crate::common::validation::{validate_capacity, MAX_FILTERS};
use crate::common::{FilterError, Result};
use crate::encoding::{pack_cursor, unpack_cursor, ByteReader, CHUNK_ITER_INIT};

/// Fingerprint slots per bucket. The persisted format depends on this, so it
/// is a compile-time constant rather than a tunable.
pub const BUCKET_SIZE: usize = 2;

/// Kick budget per sub-filter: bounds the eviction walk regardless of size.
const MAX_KICKS: usize = 500;

/// Largest accepted bucket count in a decoded header.
const MAX_NUM_BUCKETS: u64 = 1 << 31;

const RNG_SEED: u64 = 0x0075_1015_CF01_44D1;

/// Outcome of an insertion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStatus {
    /// A fingerprint slot was claimed.
    Inserted,
    /// Insert-unique found the item already present and changed nothing.
    Exists,
    /// No slot could be claimed within the kick budget anywhere.
    NoSpace,
}

/// Fixed-size header describing a cuckoo filter's counters and geometry,
/// exchanged ahead of the chunk stream and emitted on rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuckooHeader {
    /// Live fingerprint count.
    pub num_items: u64,
    /// Buckets per sub-filter (power of two).
    pub num_buckets: u64,
    /// Cumulative successful deletions.
    pub num_deletes: u64,
    /// Number of sub-filters.
    pub num_filters: u64,
}

impl CuckooHeader {
    /// Encoded size: four little-endian `u64`s.
    pub const LEN: usize = 32;

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[0..8].copy_from_slice(&self.num_items.to_le_bytes());
        buf[8..16].copy_from_slice(&self.num_buckets.to_le_bytes());
        buf[16..24].copy_from_slice(&self.num_deletes.to_le_bytes());
        buf[24..32].copy_from_slice(&self.num_filters.to_le_bytes());
        buf
    }

    /// Decodes a header; the blob must be exactly [`Self::LEN`] bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::LEN {
            return Err(FilterError::InvalidHeader);
        }
        let mut r = ByteReader::new(buf);
        Ok(Self {
            num_items: r.u64()?,
            num_buckets: r.u64()?,
            num_deletes: r.u64()?,
            num_filters: r.u64()?,
        })
    }
}

/// One sub-filter: a flat array of fingerprint slots, bucket `i` occupying
/// the `BUCKET_SIZE` bytes at `i * BUCKET_SIZE`. Zero means empty. The flat
/// layout is exactly the chunk and snapshot payload.
#[derive(Clone, PartialEq, Eq)]
struct SubFilter {
    slots: Vec<u8>,
}

impl SubFilter {
    fn new(num_buckets: u64) -> Self {
        Self { slots: vec![0u8; num_buckets as usize * BUCKET_SIZE] }
    }

    fn from_raw(slots: Vec<u8>) -> Self {
        Self { slots }
    }

    #[inline]
    fn bucket(&self, index: u64) -> &[u8] {
        let start = index as usize * BUCKET_SIZE;
        &self.slots[start..start + BUCKET_SIZE]
    }

    #[inline]
    fn bucket_mut(&mut self, index: u64) -> &mut [u8] {
        let start = index as usize * BUCKET_SIZE;
        &mut self.slots[start..start + BUCKET_SIZE]
    }

    /// Claims an empty slot in bucket `index` if one exists.
    fn place(&mut self, index: u64, fp: u8) -> bool {
        for slot in self.bucket_mut(index) {
            if *slot == 0 {
                *slot = fp;
                return true;
            }
        }
        false
    }

    fn contains(&self, i1: u64, i2: u64, fp: u8) -> bool {
        self.bucket(i1).contains(&fp) || (i2 != i1 && self.bucket(i2).contains(&fp))
    }

    fn count(&self, i1: u64, i2: u64, fp: u8) -> u64 {
        let mut n = self.bucket(i1).iter().filter(|&&slot| slot == fp).count() as u64;
        if i2 != i1 {
            n += self.bucket(i2).iter().filter(|&&slot| slot == fp).count() as u64;
        }
        n
    }

    /// Clears one matching slot, preferring the primary bucket.
    fn delete_one(&mut self, i1: u64, i2: u64, fp: u8) -> bool {
        for &index in &[i1, i2] {
            for slot in self.bucket_mut(index) {
                if *slot == fp {
                    *slot = 0;
                    return true;
                }
            }
            if i2 == i1 {
                break;
            }
        }
        false
    }

    fn byte_len(&self) -> usize {
        self.slots.len()
    }
}

/// Derives the stored fingerprint from an item hash. Zero is reserved for
/// empty slots, so it maps to 1.
#[inline]
fn fingerprint(hash: u64) -> u8 {
    let fp = (hash >> 32) as u8;
    if fp == 0 {
        1
    } else {
        fp
    }
}

#[inline]
fn alt_index(index: u64, fp: u8, mask: u64) -> u64 {
    (index ^ alt_hash(fp)) & mask
}

/// Attempts to home `fp` in one sub-filter: empty slot first, then a
/// random-walk eviction bounded by [`MAX_KICKS`]. On exhaustion the
/// sub-filter is restored from a pre-walk snapshot, so a failed attempt
/// leaves it observably unchanged.
fn try_insert(sub: &mut SubFilter, rng: &mut SmallRng, mask: u64, fp: u8, i1: u64, i2: u64) -> bool {
    if sub.place(i1, fp) || sub.place(i2, fp) {
        return true;
    }

    let snapshot = sub.slots.clone();
    let mut index = if rng.random::<bool>() { i1 } else { i2 };
    let mut homeless = fp;
    for _ in 0..MAX_KICKS {
        let victim = rng.random_range(0..BUCKET_SIZE);
        let bucket = sub.bucket_mut(index);
        std::mem::swap(&mut bucket[victim], &mut homeless);
        index = alt_index(index, homeless, mask);
        if sub.place(index, homeless) {
            return true;
        }
    }
    sub.slots.copy_from_slice(&snapshot);
    false
}

/// Cuckoo filter: an ordered sequence of equally-sized sub-filters.
#[derive(Clone)]
pub struct CuckooFilter {
    filters: Vec<SubFilter>,
    num_buckets: u64,
    num_items: u64,
    num_deletes: u64,
    rng: SmallRng,
}

impl CuckooFilter {
    /// Creates a filter sized for roughly `capacity` items: the bucket count
    /// is `capacity / BUCKET_SIZE` rounded up to a power of two.
    pub fn new(capacity: u64) -> Result<Self> {
        validate_capacity(capacity)?;
        let num_buckets = (capacity / BUCKET_SIZE as u64).next_power_of_two();
        Ok(Self {
            filters: vec![SubFilter::new(num_buckets)],
            num_buckets,
            num_items: 0,
            num_deletes: 0,
            rng: SmallRng::seed_from_u64(RNG_SEED),
        })
    }

    #[inline]
    fn lookup_params(&self, item: &[u8]) -> (u8, u64, u64) {
        let hash = item_hash(item);
        let fp = fingerprint(hash);
        let mask = self.num_buckets - 1;
        let i1 = hash & mask;
        (fp, i1, alt_index(i1, fp, mask))
    }

    /// Inserts `item`, permitting duplicates. Sub-filters are tried in order;
    /// when all reject, a fresh sub-filter is appended and tried once more.
    pub fn insert(&mut self, item: &[u8]) -> InsertStatus {
        let (fp, i1, i2) = self.lookup_params(item);
        let mask = self.num_buckets - 1;

        for sub in &mut self.filters {
            if try_insert(sub, &mut self.rng, mask, fp, i1, i2) {
                self.num_items += 1;
                return InsertStatus::Inserted;
            }
        }

        let mut fresh = SubFilter::new(self.num_buckets);
        if try_insert(&mut fresh, &mut self.rng, mask, fp, i1, i2) {
            tracing::debug!(num_filters = self.filters.len() + 1, "cuckoo filter grew");
            self.filters.push(fresh);
            self.num_items += 1;
            return InsertStatus::Inserted;
        }
        InsertStatus::NoSpace
    }

    /// Inserts `item` only if no matching fingerprint is already present.
    pub fn insert_unique(&mut self, item: &[u8]) -> InsertStatus {
        if self.check(item) {
            return InsertStatus::Exists;
        }
        self.insert(item)
    }

    /// True if a matching fingerprint sits in either candidate bucket of any
    /// sub-filter. False positives are possible, false negatives are not
    /// (for items inserted and not deleted).
    pub fn check(&self, item: &[u8]) -> bool {
        let (fp, i1, i2) = self.lookup_params(item);
        self.filters.iter().any(|sub| sub.contains(i1, i2, fp))
    }

    /// Number of matching fingerprint slots across all sub-filters; an upper
    /// bound on how many copies of `item` are present.
    pub fn count(&self, item: &[u8]) -> u64 {
        let (fp, i1, i2) = self.lookup_params(item);
        self.filters.iter().map(|sub| sub.count(i1, i2, fp)).sum()
    }

    /// Clears one matching fingerprint slot. May remove a different item
    /// that collided on both fingerprint and bucket; that trade-off is
    /// inherent to the structure.
    pub fn delete(&mut self, item: &[u8]) -> bool {
        let (fp, i1, i2) = self.lookup_params(item);
        for sub in &mut self.filters {
            if sub.delete_one(i1, i2, fp) {
                self.num_items -= 1;
                self.num_deletes += 1;
                return true;
            }
        }
        false
    }

    /// Live fingerprint count.
    pub fn num_items(&self) -> u64 {
        self.num_items
    }

    /// Cumulative successful deletions.
    pub fn num_deletes(&self) -> u64 {
        self.num_deletes
    }

    /// Number of sub-filters.
    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    /// Buckets per sub-filter.
    pub fn num_buckets(&self) -> u64 {
        self.num_buckets
    }

    /// Struct sizes plus bucket-array bytes.
    pub fn mem_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .filters
                .iter()
                .map(|sub| std::mem::size_of::<SubFilter>() + sub.byte_len())
                .sum::<usize>()
    }

    /// The filter's wire header.
    pub fn header(&self) -> CuckooHeader {
        CuckooHeader {
            num_items: self.num_items,
            num_buckets: self.num_buckets,
            num_deletes: self.num_deletes,
            num_filters: self.filters.len() as u64,
        }
    }

    /// Rebuilds a filter with zeroed buckets from a decoded header; chunk
    /// loads then overwrite the slot bytes.
    pub fn from_header(header: &CuckooHeader) -> Result<Self> {
        if header.num_buckets == 0
            || !header.num_buckets.is_power_of_two()
            || header.num_buckets > MAX_NUM_BUCKETS
        {
            return Err(FilterError::InvalidHeader);
        }
        if header.num_filters == 0 || header.num_filters > MAX_FILTERS {
            return Err(FilterError::InvalidHeader);
        }
        let filters = (0..header.num_filters)
            .map(|_| SubFilter::new(header.num_buckets))
            .collect();
        Ok(Self {
            filters,
            num_buckets: header.num_buckets,
            num_items: header.num_items,
            num_deletes: header.num_deletes,
            rng: SmallRng::seed_from_u64(RNG_SEED),
        })
    }

    /// Returns the next chunk of raw bucket bytes at `cursor` (0 and
    /// [`CHUNK_ITER_INIT`] both name the stream start) plus the cursor for
    /// the subsequent read. End of stream is `(0, empty)`.
    pub fn encoded_chunk(&self, cursor: u64, max_bytes: usize) -> Result<(u64, &[u8])> {
        if max_bytes == 0 {
            return Err(FilterError::InvalidPosition);
        }
        let (mut section, mut offset) = unpack_cursor(cursor.max(CHUNK_ITER_INIT));
        loop {
            let Some(sub) = self.filters.get(section as usize) else {
                return Ok((0, &[]));
            };
            let len = sub.byte_len() as u64;
            if offset < len {
                let take = max_bytes.min((len - offset) as usize);
                let start = offset as usize;
                return Ok((pack_cursor(section, offset + take as u64), &sub.slots[start..start + take]));
            }
            if offset > len {
                return Err(FilterError::InvalidPosition);
            }
            section += 1;
            offset = 0;
        }
    }

    /// Writes `bytes` at the range ending at `cursor`, mirroring
    /// [`encoded_chunk`](Self::encoded_chunk). Out-of-range positions fail
    /// without mutating.
    pub fn load_chunk(&mut self, cursor: u64, bytes: &[u8]) -> Result<()> {
        if cursor == 0 || bytes.is_empty() {
            return Err(FilterError::InvalidPosition);
        }
        let (section, end) = unpack_cursor(cursor);
        let sub = self
            .filters
            .get_mut(section as usize)
            .ok_or(FilterError::InvalidPosition)?;
        let start = end
            .checked_sub(bytes.len() as u64)
            .ok_or(FilterError::InvalidPosition)?;
        if end > sub.byte_len() as u64 {
            return Err(FilterError::InvalidPosition);
        }
        sub.slots[start as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn sub_filter_bytes(&self) -> impl Iterator<Item = &[u8]> {
        self.filters.iter().map(|sub| sub.slots.as_slice())
    }

    pub(crate) fn from_sub_filter_bytes(
        num_buckets: u64,
        num_items: u64,
        buffers: Vec<Vec<u8>>,
    ) -> Result<Self> {
        if num_buckets == 0 || !num_buckets.is_power_of_two() || num_buckets > MAX_NUM_BUCKETS {
            return Err(FilterError::InvalidHeader);
        }
        if buffers.is_empty() || buffers.len() as u64 > MAX_FILTERS {
            return Err(FilterError::InvalidHeader);
        }
        let expected = num_buckets as usize * BUCKET_SIZE;
        if buffers.iter().any(|buf| buf.len() != expected) {
            return Err(FilterError::InvalidHeader);
        }
        Ok(Self {
            filters: buffers.into_iter().map(SubFilter::from_raw).collect(),
            num_buckets,
            num_items,
            num_deletes: 0,
            rng: SmallRng::seed_from_u64(RNG_SEED),
        })
    }
}

impl std::fmt::Debug for CuckooFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuckooFilter")
            .field("num_buckets", &self.num_buckets)
            .field("num_items", &self.num_items)
            .field("num_deletes", &self.num_deletes)
            .field("num_filters", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_geometry() {
        let filter = CuckooFilter::new(1000).unwrap();
        assert_eq!(filter.num_buckets(), 512);
        assert_eq!(filter.num_filters(), 1);
        assert_eq!(filter.num_items(), 0);

        // tiny capacities still get at least one bucket
        assert_eq!(CuckooFilter::new(1).unwrap().num_buckets(), 1);
        assert_eq!(CuckooFilter::new(0).unwrap_err(), FilterError::BadCapacity);
    }

    #[test]
    fn test_insert_check_delete() {
        let mut filter = CuckooFilter::new(100).unwrap();
        assert_eq!(filter.insert(b"hello"), InsertStatus::Inserted);
        assert!(filter.check(b"hello"));
        assert!(!filter.check(b"world"));

        assert!(filter.delete(b"hello"));
        assert!(!filter.check(b"hello"));
        assert!(!filter.delete(b"hello"));
    }

    #[test]
    fn test_duplicates_and_count() {
        let mut filter = CuckooFilter::new(1000).unwrap();
        assert_eq!(filter.insert(b"a"), InsertStatus::Inserted);
        assert_eq!(filter.insert(b"a"), InsertStatus::Inserted);
        assert_eq!(filter.count(b"a"), 2);
        assert!(filter.delete(b"a"));
        assert_eq!(filter.count(b"a"), 1);
        assert_eq!(filter.num_deletes(), 1);
    }

    #[test]
    fn test_insert_unique_is_a_function_of_state() {
        let mut filter = CuckooFilter::new(1000).unwrap();
        assert_eq!(filter.insert_unique(b"b"), InsertStatus::Inserted);
        let before = filter.num_items();
        assert_eq!(filter.insert_unique(b"b"), InsertStatus::Exists);
        assert_eq!(filter.num_items(), before);
    }

    #[test]
    fn test_item_accounting() {
        let mut filter = CuckooFilter::new(1000).unwrap();
        let mut inserted = 0u64;
        for i in 0..200u32 {
            if filter.insert(&i.to_le_bytes()) == InsertStatus::Inserted {
                inserted += 1;
            }
        }
        let mut deleted = 0u64;
        for i in 0..100u32 {
            if filter.delete(&i.to_le_bytes()) {
                deleted += 1;
            }
        }
        assert_eq!(filter.num_items(), inserted - deleted);
        assert_eq!(filter.num_deletes(), deleted);
    }

    #[test]
    fn test_alt_index_is_an_involution() {
        let mask = 511u64;
        for fp in 1..=u8::MAX {
            for index in [0u64, 1, 17, 255, 511] {
                let alt = alt_index(index, fp, mask);
                assert_eq!(alt_index(alt, fp, mask), index);
            }
        }
    }

    #[test]
    fn test_fingerprint_never_zero() {
        for hash in [0u64, 1, 1 << 32, u64::MAX, 0xFFFF_FFFF] {
            assert_ne!(fingerprint(hash), 0);
        }
    }

    #[test]
    fn test_overfill_grows_without_losing_items() {
        // 2 buckets * 2 slots per sub-filter: growth kicks in almost at once
        let mut filter = CuckooFilter::new(4).unwrap();
        let items: Vec<Vec<u8>> = (0..40).map(|i| format!("x{i}").into_bytes()).collect();
        for item in &items {
            assert_eq!(filter.insert(item), InsertStatus::Inserted);
        }
        assert!(filter.num_filters() >= 2);
        for item in &items {
            assert!(filter.check(item), "lost {:?}", String::from_utf8_lossy(item));
        }
        assert_eq!(filter.num_items(), 40);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut filter = CuckooFilter::new(100).unwrap();
        for i in 0..50u32 {
            filter.insert(&i.to_le_bytes());
        }
        filter.delete(&3u32.to_le_bytes());

        let header = CuckooHeader::from_bytes(&filter.header().to_bytes()).unwrap();
        assert_eq!(header, filter.header());

        assert_eq!(CuckooHeader::from_bytes(&[0; 31]), Err(FilterError::InvalidHeader));
        assert_eq!(CuckooHeader::from_bytes(&[0; 33]), Err(FilterError::InvalidHeader));
    }

    #[test]
    fn test_from_header_validates_geometry() {
        let bad_buckets = CuckooHeader { num_items: 0, num_buckets: 3, num_deletes: 0, num_filters: 1 };
        assert_eq!(CuckooFilter::from_header(&bad_buckets).unwrap_err(), FilterError::InvalidHeader);

        let no_filters = CuckooHeader { num_items: 0, num_buckets: 4, num_deletes: 0, num_filters: 0 };
        assert_eq!(CuckooFilter::from_header(&no_filters).unwrap_err(), FilterError::InvalidHeader);
    }

    #[test]
    fn test_chunk_stream_roundtrip() {
        let mut filter = CuckooFilter::new(64).unwrap();
        for i in 0..150u32 {
            filter.insert(&i.to_le_bytes());
        }
        assert!(filter.num_filters() >= 2);

        let mut restored = CuckooFilter::from_header(&filter.header()).unwrap();
        let mut cursor = 0u64;
        loop {
            let (next, chunk) = filter.encoded_chunk(cursor, 13).unwrap();
            if chunk.is_empty() {
                assert_eq!(next, 0);
                break;
            }
            restored.load_chunk(next, chunk).unwrap();
            cursor = next;
        }

        for i in 0..150u32 {
            assert!(restored.check(&i.to_le_bytes()));
        }
        assert_eq!(restored.num_items(), filter.num_items());
        assert_eq!(restored.num_deletes(), filter.num_deletes());
        assert_eq!(restored.mem_usage(), filter.mem_usage());
    }

    #[test]
    fn test_load_chunk_rejects_bad_positions() {
        let filter = CuckooFilter::new(100).unwrap();
        let mut restored = CuckooFilter::from_header(&filter.header()).unwrap();

        assert_eq!(restored.load_chunk(0, b"zz"), Err(FilterError::InvalidPosition));
        let past_end = pack_cursor(0, restored.num_buckets() * BUCKET_SIZE as u64 + 4);
        assert_eq!(restored.load_chunk(past_end, b"zz"), Err(FilterError::InvalidPosition));
        let bad_section = pack_cursor(9, 2);
        assert_eq!(restored.load_chunk(bad_section, b"zz"), Err(FilterError::InvalidPosition));
    }
}
