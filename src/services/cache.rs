use crate::core::area::candidate_codes;
use crate::models::{AreaCode, CellSize, GeoPoint};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache key: cell size plus the exact bits of both coordinates
type CodeKey = (CellSize, u64, u64);

/// Bounded memo of [`candidate_codes`] results.
///
/// Trackers standing still report the same coordinates over and over; this
/// avoids recomputing their codes. It is an explicit object shared by the
/// ingestion path and the location search, not process-wide state.
pub struct AreaCodeCache {
    codes: Cache<CodeKey, Arc<Vec<AreaCode>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AreaCodeCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            codes: Cache::new(max_entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the candidate codes of `point`, computing them on a miss
    pub fn candidate_codes(&self, cell_size: CellSize, point: &GeoPoint) -> Arc<Vec<AreaCode>> {
        let key = (cell_size, point.latitude.to_bits(), point.longitude.to_bits());

        if let Some(codes) = self.codes.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Area code cache hit: {:?}", key);
            return codes;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let codes = Arc::new(candidate_codes(cell_size, point));
        self.codes.insert(key, Arc::clone(&codes));
        codes
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let total = hit_count + miss_count;

        CacheStats {
            size: self.codes.entry_count(),
            hit_count,
            miss_count,
            hit_rate: if total > 0 {
                hit_count as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_returns_computed_codes() {
        let cache = AreaCodeCache::new(100);
        let point = GeoPoint::new(47.4979, 19.0402);

        let first = cache.candidate_codes(2000, &point);
        let second = cache.candidate_codes(2000, &point);

        assert_eq!(*first, candidate_codes(2000, &point));
        assert_eq!(first, second);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_cell_size_is_part_of_key() {
        let cache = AreaCodeCache::new(100);
        let point = GeoPoint::new(47.4979, 19.0402);

        let small = cache.candidate_codes(200, &point);
        let large = cache.candidate_codes(10_000, &point);

        assert_ne!(small[0], large[0]);
        assert_eq!(cache.stats().miss_count, 2);
    }
}
