use serde::{Deserialize, Serialize};

use crate::district::DistrictSummary;
use crate::error::LookupError;

/// Outcome of a single query: a result variant or a typed error.
pub type LookupOutcome = Result<LookupResult, LookupError>;

/// Successful query results.
///
/// `Exact` means the point lies inside the returned district's polygon;
/// `Approximate` means it lies outside all polygons and the returned
/// district is the nearest-centroid fallback. `NotFound` only occurs
/// against an empty store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum LookupResult {
    Exact {
        #[serde(flatten)]
        district: DistrictSummary,
    },
    Approximate {
        #[serde(flatten)]
        district: DistrictSummary,
        distance_meters: u32,
    },
    NotFound,
}

impl LookupResult {
    pub fn is_exact(&self) -> bool {
        matches!(self, LookupResult::Exact { .. })
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, LookupResult::Approximate { .. })
    }

    /// The matched district, if any.
    pub fn district(&self) -> Option<&DistrictSummary> {
        match self {
            LookupResult::Exact { district } => Some(district),
            LookupResult::Approximate { district, .. } => Some(district),
            LookupResult::NotFound => None,
        }
    }
}

/// Engine-level figures reported through `stats()`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_districts: u64,
    pub school_year: String,
    pub tolerance: f64,
    pub lru_capacity: usize,
    pub lru_size: usize,
    pub memory_rss_bytes: u64,
}
