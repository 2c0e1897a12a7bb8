use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default geometry simplification tolerance, in degrees.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Default capacity of the decoded-geometry LRU cache.
pub const DEFAULT_LRU_CAPACITY: usize = 64;

/// Default upper bound on `lookup_batch` input length.
pub const DEFAULT_BATCH_MAX: usize = 100;

/// Engine configuration, constructed explicitly and passed as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Absolute path to the built district store.
    pub store_path: PathBuf,
    /// Max entries cached by the geometry decoder; 0 disables the cache.
    pub lru_capacity: usize,
    /// Upper bound accepted by `lookup_batch`.
    pub batch_max: usize,
    /// Build-time simplification tolerance. Ignored online; the value
    /// reported by `stats()` comes from the store header.
    pub tolerance: f64,
}

impl EngineConfig {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            lru_capacity: DEFAULT_LRU_CAPACITY,
            batch_max: DEFAULT_BATCH_MAX,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("districts.atlas")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.lru_capacity, 64);
        assert_eq!(config.batch_max, 100);
        assert!((config.tolerance - 1e-4).abs() < 1e-12);
    }
}
