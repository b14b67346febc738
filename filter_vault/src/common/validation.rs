//! Parameter bounds shared by constructors, the command layer, and decoders.

use crate::common::{FilterError, Result};

/// Capacities must be addressable with 32 bits; anything at or above this is
/// rejected before any allocation happens.
pub const MAX_CAPACITY: u64 = 1 << 32;

/// Upper bound on layers in a bloom chain or sub-filters in a cuckoo filter
/// accepted from a decoded header or snapshot.
pub const MAX_FILTERS: u64 = 1000;

/// Validate a requested filter capacity.
pub fn validate_capacity(capacity: u64) -> Result<()> {
    if capacity == 0 || capacity >= MAX_CAPACITY {
        return Err(FilterError::BadCapacity);
    }
    Ok(())
}

/// Validate a false-positive rate target. Rejects NaN along with everything
/// outside the open interval (0, 1).
pub fn validate_error_rate(error: f64) -> Result<()> {
    if !(error > 0.0 && error < 1.0) {
        return Err(FilterError::BadErrorRate);
    }
    Ok(())
}
