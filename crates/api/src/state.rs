//! Application state shared across handlers.

use etl_core::{AvgByAgeRow, CatalogStore, RatingsByCountryRow, TopByGenreRow, WarehouseStore};
use moka::future::Cache;
use pipeline::EtlRunner;
use std::sync::Arc;
use std::time::Duration;

/// Cache TTL for insight responses (30 seconds).
pub const INSIGHT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Generations kept per view; only the latest is ever read.
const INSIGHT_CACHE_MAX_CAPACITY: u64 = 4;

/// Mart rows cached per runner generation.
///
/// A completed run bumps the generation, so entries from before it are
/// never read again and age out with the TTL.
#[derive(Clone)]
pub struct InsightCache {
    pub top_by_genre: Cache<u64, Arc<Vec<TopByGenreRow>>>,
    pub avg_by_age: Cache<u64, Arc<Vec<AvgByAgeRow>>>,
    pub ratings_by_country: Cache<u64, Arc<Vec<RatingsByCountryRow>>>,
}

impl InsightCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            top_by_genre: build_cache(ttl),
            avg_by_age: build_cache(ttl),
            ratings_by_country: build_cache(ttl),
        }
    }

    pub fn invalidate_all(&self) {
        self.top_by_genre.invalidate_all();
        self.avg_by_age.invalidate_all();
        self.ratings_by_country.invalidate_all();
    }
}

impl Default for InsightCache {
    fn default() -> Self {
        Self::new(INSIGHT_CACHE_TTL)
    }
}

fn build_cache<V: Clone + Send + Sync + 'static>(ttl: Duration) -> Cache<u64, V> {
    Cache::builder()
        .max_capacity(INSIGHT_CACHE_MAX_CAPACITY)
        .time_to_live(ttl)
        .build()
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Staging, warehouse and marts
    pub warehouse: Arc<dyn WarehouseStore>,
    /// Application schema behind the CRUD endpoints
    pub catalog: Arc<dyn CatalogStore>,
    /// Pipeline runner (owns the run lock and exporter)
    pub runner: Arc<EtlRunner>,
    pub insights: InsightCache,
}

impl AppState {
    pub fn new(
        warehouse: Arc<dyn WarehouseStore>,
        catalog: Arc<dyn CatalogStore>,
        runner: Arc<EtlRunner>,
    ) -> Self {
        Self {
            warehouse,
            catalog,
            runner,
            insights: InsightCache::default(),
        }
    }

    /// Create with a custom insight cache TTL.
    pub fn with_cache_ttl(
        warehouse: Arc<dyn WarehouseStore>,
        catalog: Arc<dyn CatalogStore>,
        runner: Arc<EtlRunner>,
        ttl: Duration,
    ) -> Self {
        Self {
            warehouse,
            catalog,
            runner,
            insights: InsightCache::new(ttl),
        }
    }
}
