//! Bounded LRU over decoded geometries.
//!
//! The cache is a warm-path accelerator, not a working set: capacities
//! in the tens keep repeat lookups cheap while the store file stays the
//! source of truth. Capacity 0 disables caching entirely.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use geo::MultiPolygon;
use lru::LruCache;

use crate::district::DistrictId;

/// Thread-safe LRU of decoded district geometries, keyed by district id.
pub struct GeometryCache {
    inner: Option<Mutex<LruCache<DistrictId, Arc<MultiPolygon<f64>>>>>,
    capacity: usize,
}

impl GeometryCache {
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner, capacity }
    }

    /// Fetch a geometry, marking it most-recently used.
    pub fn get(&self, id: &DistrictId) -> Option<Arc<MultiPolygon<f64>>> {
        let cache = self.inner.as_ref()?;
        cache.lock().expect("geometry cache poisoned").get(id).cloned()
    }

    /// Insert or refresh a geometry, evicting the least-recently used
    /// entry when full.
    pub fn put(&self, id: DistrictId, geometry: Arc<MultiPolygon<f64>>) {
        if let Some(cache) = self.inner.as_ref() {
            cache.lock().expect("geometry cache poisoned").put(id, geometry);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .as_ref()
            .map(|c| c.lock().expect("geometry cache poisoned").len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: f64) -> Arc<MultiPolygon<f64>> {
        Arc::new(MultiPolygon(vec![polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 0.0),
        ]]))
    }

    #[test]
    fn put_then_get_returns_value() {
        let cache = GeometryCache::new(2);
        cache.put(DistrictId::new("a"), square(0.0));
        assert!(cache.get(&DistrictId::new("a")).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache = GeometryCache::new(2);
        cache.put(DistrictId::new("a"), square(0.0));
        cache.put(DistrictId::new("b"), square(1.0));
        cache.put(DistrictId::new("c"), square(2.0));
        assert!(cache.get(&DistrictId::new("a")).is_none());
        assert!(cache.get(&DistrictId::new("b")).is_some());
        assert!(cache.get(&DistrictId::new("c")).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = GeometryCache::new(2);
        cache.put(DistrictId::new("a"), square(0.0));
        cache.put(DistrictId::new("b"), square(1.0));
        // touch "a" so "b" becomes the eviction victim
        assert!(cache.get(&DistrictId::new("a")).is_some());
        cache.put(DistrictId::new("c"), square(2.0));
        assert!(cache.get(&DistrictId::new("a")).is_some());
        assert!(cache.get(&DistrictId::new("b")).is_none());
    }

    #[test]
    fn update_of_existing_key_does_not_grow() {
        let cache = GeometryCache::new(2);
        cache.put(DistrictId::new("a"), square(0.0));
        cache.put(DistrictId::new("a"), square(5.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_bypasses_cache() {
        let cache = GeometryCache::new(0);
        cache.put(DistrictId::new("a"), square(0.0));
        assert!(cache.get(&DistrictId::new("a")).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.capacity(), 0);
    }
}
