//! Storage seams.
//!
//! [`WarehouseStore`] holds the pipeline layers (staging, warehouse, marts);
//! [`CatalogStore`] holds the application schema. Both are implemented by
//! the ClickHouse backend and by [`crate::memory::MemoryStore`].

use async_trait::async_trait;

use crate::catalog::{Movie, NewMovie, NewRating, Rating};
use crate::error::Result;
use crate::mart::{AvgByAgeRow, RatingsByCountryRow, TopByGenreRow};
use crate::staging::{StagingBatch, StagingCounts};
use crate::warehouse::{QualityMetric, WarehouseCounts, WarehouseSnapshot};

/// Pipeline layers.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;

    /// Creates every schema object that does not exist yet, marts included.
    async fn ensure_schema(&self) -> Result<()>;

    /// Truncates staging and loads the batch.
    async fn replace_staging(&self, batch: &StagingBatch) -> Result<StagingCounts>;

    /// Reads staging back in `source_line` order.
    async fn read_staging(&self) -> Result<StagingBatch>;

    /// Replaces the whole warehouse. Readers see either the old or the new
    /// contents, never a mix.
    async fn replace_warehouse(&self, snapshot: &WarehouseSnapshot) -> Result<WarehouseCounts>;

    /// (Re)defines the mart views.
    async fn define_marts(&self) -> Result<()>;

    /// Reads the warehouse, ordered by primary key.
    async fn read_warehouse(&self) -> Result<WarehouseSnapshot>;

    async fn top_by_genre(&self) -> Result<Vec<TopByGenreRow>>;

    async fn avg_by_age(&self) -> Result<Vec<AvgByAgeRow>>;

    async fn ratings_by_country(&self) -> Result<Vec<RatingsByCountryRow>>;

    async fn quality_metrics(&self) -> Result<Vec<QualityMetric>>;
}

/// Application schema behind the CRUD API.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Movies ordered by id.
    async fn list_movies(&self) -> Result<Vec<Movie>>;

    async fn get_movie(&self, id: u64) -> Result<Option<Movie>>;

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie>;

    /// Returns `None` when the movie does not exist.
    async fn update_movie(&self, id: u64, movie: NewMovie) -> Result<Option<Movie>>;

    /// Returns `false` when the movie does not exist.
    async fn delete_movie(&self, id: u64) -> Result<bool>;

    /// Ratings ordered by id, optionally only those of one movie.
    async fn list_ratings(&self, movie_id: Option<u64>) -> Result<Vec<Rating>>;

    async fn get_rating(&self, id: u64) -> Result<Option<Rating>>;

    /// Fails with not-found when the referenced movie does not exist.
    async fn create_rating(&self, rating: NewRating) -> Result<Rating>;
}
