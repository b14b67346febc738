//! Hash derivation for filter probing, indexing, and fingerprint alternation.
//!
//! All hashing goes through `xxh64` with fixed seeds. Any 64-bit hash with
//! uniform output would do; nothing here assumes cryptographic strength.

use xxhash_rust::xxh64::xxh64;

/// Seed for the primary hash (bloom probe base, cuckoo bucket index).
const PRIMARY_SEED: u64 = 0;

/// Seed for the secondary hash (bloom probe stride).
const STRIDE_SEED: u64 = 1;

/// Seed for hashing a fingerprint into its alternate-bucket displacement.
const ALT_SEED: u64 = 0xDEAD_BEEF;

/// Two independent 64-bit hashes of `item` for Kirsch–Mitzenmacher double
/// hashing: probe `i` is `h1 + i * h2` reduced into the bit range.
#[inline]
pub fn double_hash(item: &[u8]) -> (u64, u64) {
    (xxh64(item, PRIMARY_SEED), xxh64(item, STRIDE_SEED))
}

/// The single 64-bit hash driving cuckoo indexing and fingerprinting.
#[inline]
pub fn item_hash(item: &[u8]) -> u64 {
    xxh64(item, PRIMARY_SEED)
}

/// Hash of a stored fingerprint, used to derive the alternate bucket index
/// via XOR. Depends only on the fingerprint so the mapping is an involution.
#[inline]
pub fn alt_hash(fingerprint: u8) -> u64 {
    xxh64(&[fingerprint], ALT_SEED)
}
