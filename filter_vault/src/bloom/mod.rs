//! Scaling bloom filter chain and its building blocks.

mod bitvec;
mod filter;
mod scaling;

pub use bitvec::BitVector;
pub use filter::BloomFilter;
pub use scaling::{BloomLayer, ScalingBloom, DEFAULT_GROWTH, DEFAULT_TIGHTENING};
