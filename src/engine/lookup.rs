//! The online query path: bbox filter, exact containment, nearest
//! fallback.
//!
//! A query moves through fixed phases — validate, candidate search,
//! containment check, then either an exact hit or the nearest-centroid
//! fallback — and terminates in exactly one result or error variant.
//! Queries are cancellable between phases and between candidate
//! decodes; an in-flight decode may complete before cancellation is
//! observed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use geo::{Contains, MultiPolygon, Point};
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::district::{DistrictRow, DistrictSummary};
use crate::error::{LookupError, StoreError, LAT_RANGE, LNG_RANGE};
use crate::geom::point_to_multipolygon_meters;
use crate::store::{DistrictStore, GeometryCache};

use super::result::{EngineStats, LookupOutcome, LookupResult};

/// Number of fallback candidates examined in centroid order.
const NEAREST_K: usize = 5;

/// Advisory cancellation handle, checked between query phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process-wide read-only lookup service: store handle, decoded-geometry
/// cache, and shutdown state. Safe to share across query threads.
pub struct LookupEngine {
    store: DistrictStore,
    cache: GeometryCache,
    batch_max: usize,
    shutdown: AtomicBool,
    in_flight: AtomicUsize,
}

impl LookupEngine {
    /// Open the configured store and prepare the query paths.
    pub fn open(config: &EngineConfig) -> Result<Self, StoreError> {
        let store = DistrictStore::open(&config.store_path)?;
        info!(
            districts = store.len(),
            lru_capacity = config.lru_capacity,
            "lookup engine ready"
        );
        Ok(Self {
            store,
            cache: GeometryCache::new(config.lru_capacity),
            batch_max: config.batch_max,
            shutdown: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        })
    }

    pub fn store(&self) -> &DistrictStore {
        &self.store
    }

    /// Resolve `(lat, lng)` to its containing district, or the nearest
    /// one when no boundary contains it.
    pub fn lookup(&self, lat: f64, lng: f64) -> LookupOutcome {
        self.lookup_with_cancel(lat, lng, &CancelToken::new())
    }

    /// As [`lookup`](Self::lookup), checking `cancel` between phases.
    pub fn lookup_with_cancel(&self, lat: f64, lng: f64, cancel: &CancelToken) -> LookupOutcome {
        self.checkpoint(cancel)?;
        let _guard = InFlightGuard::enter(&self.in_flight);

        // phase: validate
        validate_coordinates(lat, lng)?;
        self.checkpoint(cancel)?;

        // phase: candidate search
        let candidates = self.store.candidates_covering(lng, lat);
        self.checkpoint(cancel)?;

        // phase: containment check
        let point = Point::new(lng, lat);
        for row in candidates {
            let geometry = match self.decoded_geometry(row) {
                Ok(g) => g,
                Err(e) => {
                    // one bad row never fails the query
                    error!(district_id = %row.id, error = %e, "skipping undecodable candidate");
                    continue;
                }
            };
            if geometry.contains(&point) {
                debug!(district_id = %row.id, "exact containment hit");
                return Ok(LookupResult::Exact {
                    district: DistrictSummary::from_row(row, &self.store.meta().school_year),
                });
            }
            self.checkpoint(cancel)?;
        }

        // phase: nearest fallback
        for row in self.store.nearest_by_centroid(lng, lat, NEAREST_K) {
            let geometry = match self.decoded_geometry(row) {
                Ok(g) => g,
                Err(e) => {
                    error!(district_id = %row.id, error = %e, "skipping undecodable fallback candidate");
                    continue;
                }
            };
            let distance = point_to_multipolygon_meters(lng, lat, &geometry);
            debug!(district_id = %row.id, distance_m = distance, "nearest fallback hit");
            return Ok(LookupResult::Approximate {
                district: DistrictSummary::from_row(row, &self.store.meta().school_year),
                distance_meters: distance.round() as u32,
            });
        }

        Ok(LookupResult::NotFound)
    }

    /// Resolve every point independently; results match input order.
    pub fn lookup_batch(&self, points: &[(f64, f64)]) -> Result<Vec<LookupOutcome>, LookupError> {
        if points.len() > self.batch_max {
            return Err(LookupError::BatchLimitExceeded { len: points.len(), max: self.batch_max });
        }
        Ok(points.iter().map(|&(lat, lng)| self.lookup(lat, lng)).collect())
    }

    pub fn stats(&self) -> EngineStats {
        let store = self.store.stats();
        EngineStats {
            total_districts: store.total_districts,
            school_year: store.school_year,
            tolerance: store.tolerance,
            lru_capacity: self.cache.capacity(),
            lru_size: self.cache.len(),
            memory_rss_bytes: process_rss_bytes(),
        }
    }

    /// Stop accepting new queries. Idempotent; in-flight queries run to
    /// completion.
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::Relaxed) {
            info!("lookup engine shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Wait up to `grace` for in-flight queries to finish. Returns true
    /// when the engine is idle.
    pub fn drain(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while self.in_flight.load(Ordering::Acquire) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    /// Decode a row's geometry through the LRU.
    fn decoded_geometry(&self, row: &DistrictRow) -> Result<Arc<MultiPolygon<f64>>, LookupError> {
        if let Some(hit) = self.cache.get(&row.id) {
            return Ok(hit);
        }
        let geometry = Arc::new(self.store.read_geometry(row)?);
        self.cache.put(row.id.clone(), geometry.clone());
        Ok(geometry)
    }

    fn checkpoint(&self, cancel: &CancelToken) -> Result<(), LookupError> {
        if self.shutdown.load(Ordering::Relaxed) || cancel.is_cancelled() {
            return Err(LookupError::Cancelled);
        }
        Ok(())
    }
}

/// Counts a query in and out so shutdown can drain.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn validate_coordinates(lat: f64, lng: f64) -> Result<(), LookupError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(LookupError::CoordinateNotFinite { lat, lng });
    }
    if lat < LAT_RANGE.0 || lat > LAT_RANGE.1 || lng < LNG_RANGE.0 || lng > LNG_RANGE.1 {
        return Err(LookupError::CoordinateOutOfRange { lat, lng });
    }
    Ok(())
}

/// Resident set size of this process, for `stats()`.
fn process_rss_bytes() -> u64 {
    use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

    let mut system = System::new();
    let pid = Pid::from_u32(std::process::id());
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}
