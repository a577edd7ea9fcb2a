//! Mock implementations for testing.

use async_trait::async_trait;
use etl_core::{
    AvgByAgeRow, CatalogStore, Error, Movie, NewMovie, NewRating, QualityMetric, Rating,
    RatingsByCountryRow, Result, StagingBatch, StagingCounts, TopByGenreRow, WarehouseCounts,
    WarehouseSnapshot, WarehouseStore,
};

/// Store whose every call fails like an unreachable database.
///
/// Implements the same traits as the real backends so tests exercise the
/// production error paths of the handlers and the runner.
#[derive(Debug, Clone, Default)]
pub struct FailingStore;

impl FailingStore {
    pub fn new() -> Self {
        Self
    }

    fn fail<T>(op: &str) -> Result<T> {
        Err(Error::store(format!("{} failed: connection refused", op)))
    }
}

#[async_trait]
impl WarehouseStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn ping(&self) -> Result<()> {
        Self::fail("ping")
    }

    async fn ensure_schema(&self) -> Result<()> {
        Self::fail("ensure_schema")
    }

    async fn replace_staging(&self, _batch: &StagingBatch) -> Result<StagingCounts> {
        Self::fail("replace_staging")
    }

    async fn read_staging(&self) -> Result<StagingBatch> {
        Self::fail("read_staging")
    }

    async fn replace_warehouse(&self, _snapshot: &WarehouseSnapshot) -> Result<WarehouseCounts> {
        Self::fail("replace_warehouse")
    }

    async fn define_marts(&self) -> Result<()> {
        Self::fail("define_marts")
    }

    async fn read_warehouse(&self) -> Result<WarehouseSnapshot> {
        Self::fail("read_warehouse")
    }

    async fn top_by_genre(&self) -> Result<Vec<TopByGenreRow>> {
        Self::fail("top_by_genre")
    }

    async fn avg_by_age(&self) -> Result<Vec<AvgByAgeRow>> {
        Self::fail("avg_by_age")
    }

    async fn ratings_by_country(&self) -> Result<Vec<RatingsByCountryRow>> {
        Self::fail("ratings_by_country")
    }

    async fn quality_metrics(&self) -> Result<Vec<QualityMetric>> {
        Self::fail("quality_metrics")
    }
}

#[async_trait]
impl CatalogStore for FailingStore {
    async fn list_movies(&self) -> Result<Vec<Movie>> {
        Self::fail("list_movies")
    }

    async fn get_movie(&self, _id: u64) -> Result<Option<Movie>> {
        Self::fail("get_movie")
    }

    async fn create_movie(&self, _movie: NewMovie) -> Result<Movie> {
        Self::fail("create_movie")
    }

    async fn update_movie(&self, _id: u64, _movie: NewMovie) -> Result<Option<Movie>> {
        Self::fail("update_movie")
    }

    async fn delete_movie(&self, _id: u64) -> Result<bool> {
        Self::fail("delete_movie")
    }

    async fn list_ratings(&self, _movie_id: Option<u64>) -> Result<Vec<Rating>> {
        Self::fail("list_ratings")
    }

    async fn get_rating(&self, _id: u64) -> Result<Option<Rating>> {
        Self::fail("get_rating")
    }

    async fn create_rating(&self, _rating: NewRating) -> Result<Rating> {
        Self::fail("create_rating")
    }
}
