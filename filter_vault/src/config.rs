//! Module-load configuration.
//!
//! Parsed once from name/value argument pairs when the embedder loads the
//! module, then passed immutably into the command layer. The names are
//! matched case-insensitively, as the original module options were.

use crate::common::{FilterError, Result};

/// Default bloom chain capacity for `BF.ADD` against an absent key.
pub const DEFAULT_BLOOM_CAPACITY: u64 = 100;

/// Default bloom error-rate target for `BF.ADD` against an absent key.
pub const DEFAULT_ERROR_RATE: f64 = 0.01;

/// Default cuckoo filter capacity for `CF.ADD` against an absent key.
pub const DEFAULT_CUCKOO_CAPACITY: u64 = 1000;

/// Immutable defaults used when commands create filters on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig {
    /// Initial bloom chain capacity (`initial_size`).
    pub bloom_capacity: u64,
    /// Bloom false-positive target (`error_rate`).
    pub error_rate: f64,
    /// Initial cuckoo filter capacity.
    pub cuckoo_capacity: u64,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            bloom_capacity: DEFAULT_BLOOM_CAPACITY,
            error_rate: DEFAULT_ERROR_RATE,
            cuckoo_capacity: DEFAULT_CUCKOO_CAPACITY,
        }
    }
}

impl ModuleConfig {
    /// Parses `name value` argument pairs, e.g.
    /// `["initial_size", "400", "error_rate", "0.004"]`.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        if args.len() % 2 != 0 {
            return Err(FilterError::BadConfig(
                "Invalid number of arguments passed".to_owned(),
            ));
        }

        let mut config = Self::default();
        for pair in args.chunks(2) {
            let name = pair[0].as_ref();
            let value = pair[1].as_ref();
            if name.eq_ignore_ascii_case("initial_size") {
                let size: u64 = value.parse().map_err(|_| {
                    FilterError::BadConfig("Invalid argument for 'INITIAL_SIZE'".to_owned())
                })?;
                if size == 0 {
                    return Err(FilterError::BadConfig("INITIAL_SIZE must be > 0".to_owned()));
                }
                config.bloom_capacity = size;
            } else if name.eq_ignore_ascii_case("error_rate") {
                let rate: f64 = value.parse().map_err(|_| {
                    FilterError::BadConfig("Invalid argument for 'ERROR_RATE'".to_owned())
                })?;
                if rate <= 0.0 {
                    return Err(FilterError::BadConfig("ERROR_RATE must be > 0".to_owned()));
                }
                config.error_rate = rate;
            } else {
                return Err(FilterError::BadConfig("Unrecognized option".to_owned()));
            }
        }
        Ok(config)
    }
}
