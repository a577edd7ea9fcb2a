//! [`WarehouseStore`] and [`CatalogStore`] over ClickHouse.

use crate::client::ClickHouseClient;
use crate::insert::{self, AppMovieRow, AppRatingRow};
use crate::query;
use crate::schema::{self, APP_MOVIES, APP_RATINGS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use etl_core::{
    AvgByAgeRow, CatalogStore, Error, Movie, NewMovie, NewRating, QualityMetric, Rating,
    RatingsByCountryRow, Result, StagingBatch, StagingCounts, TopByGenreRow, WarehouseCounts,
    WarehouseSnapshot, WarehouseStore,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// ClickHouse-backed store for every layer.
pub struct ClickHouseStore {
    client: ClickHouseClient,
    /// Serializes catalogue writes so `max(id) + 1` stays unique.
    catalog_writes: Mutex<()>,
    last_version: AtomicU64,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self {
            client,
            catalog_writes: Mutex::new(()),
            last_version: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    /// Row version for ReplacingMergeTree: wall-clock millis, strictly increasing.
    fn next_version(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut current = self.last_version.load(Ordering::Relaxed);
        loop {
            let next = now.max(current + 1);
            match self.last_version.compare_exchange(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

#[async_trait]
impl WarehouseStore for ClickHouseStore {
    fn backend(&self) -> &'static str {
        "clickhouse"
    }

    async fn ping(&self) -> Result<()> {
        self.client.execute("SELECT 1").await
    }

    async fn ensure_schema(&self) -> Result<()> {
        schema::init_schema(&self.client).await?;
        info!("ClickHouse schema ready");
        Ok(())
    }

    async fn replace_staging(&self, batch: &StagingBatch) -> Result<StagingCounts> {
        insert::replace_staging(&self.client, batch).await
    }

    async fn read_staging(&self) -> Result<StagingBatch> {
        query::read_staging(&self.client).await
    }

    async fn replace_warehouse(&self, snapshot: &WarehouseSnapshot) -> Result<WarehouseCounts> {
        insert::replace_warehouse(&self.client, snapshot).await
    }

    async fn define_marts(&self) -> Result<()> {
        schema::define_marts(&self.client).await
    }

    async fn read_warehouse(&self) -> Result<WarehouseSnapshot> {
        query::read_warehouse(&self.client).await
    }

    async fn top_by_genre(&self) -> Result<Vec<TopByGenreRow>> {
        query::top_by_genre(&self.client).await
    }

    async fn avg_by_age(&self) -> Result<Vec<AvgByAgeRow>> {
        query::avg_by_age(&self.client).await
    }

    async fn ratings_by_country(&self) -> Result<Vec<RatingsByCountryRow>> {
        query::ratings_by_country(&self.client).await
    }

    async fn quality_metrics(&self) -> Result<Vec<QualityMetric>> {
        query::quality_metrics(&self.client).await
    }
}

#[async_trait]
impl CatalogStore for ClickHouseStore {
    async fn list_movies(&self) -> Result<Vec<Movie>> {
        query::list_movies(&self.client).await
    }

    async fn get_movie(&self, id: u64) -> Result<Option<Movie>> {
        query::get_movie(&self.client, id).await
    }

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie> {
        let _guard = self.catalog_writes.lock().await;

        let id = query::max_id(&self.client, APP_MOVIES).await? + 1;
        let movie = Movie {
            id,
            title: movie.title,
            year: movie.year,
            genre: movie.genre,
            imdb_id: movie.imdb_id,
        };
        insert::write_movie(&self.client, AppMovieRow::new(&movie, self.next_version(), false))
            .await?;

        debug!(id = id, "Movie created");
        Ok(movie)
    }

    async fn update_movie(&self, id: u64, movie: NewMovie) -> Result<Option<Movie>> {
        let _guard = self.catalog_writes.lock().await;

        if query::get_movie(&self.client, id).await?.is_none() {
            return Ok(None);
        }
        let movie = Movie {
            id,
            title: movie.title,
            year: movie.year,
            genre: movie.genre,
            imdb_id: movie.imdb_id,
        };
        insert::write_movie(&self.client, AppMovieRow::new(&movie, self.next_version(), false))
            .await?;
        Ok(Some(movie))
    }

    async fn delete_movie(&self, id: u64) -> Result<bool> {
        let _guard = self.catalog_writes.lock().await;

        let Some(movie) = query::get_movie(&self.client, id).await? else {
            return Ok(false);
        };

        // Ratings of the movie go with it
        let ratings = query::list_ratings(&self.client, Some(id)).await?;
        let version = self.next_version();
        let tombstones: Vec<AppRatingRow> = ratings
            .iter()
            .map(|r| AppRatingRow::new(r, version, true))
            .collect();
        insert::write_ratings(&self.client, &tombstones).await?;
        insert::write_movie(&self.client, AppMovieRow::new(&movie, version, true)).await?;

        debug!(id = id, ratings = tombstones.len(), "Movie deleted");
        Ok(true)
    }

    async fn list_ratings(&self, movie_id: Option<u64>) -> Result<Vec<Rating>> {
        query::list_ratings(&self.client, movie_id).await
    }

    async fn get_rating(&self, id: u64) -> Result<Option<Rating>> {
        query::get_rating(&self.client, id).await
    }

    async fn create_rating(&self, rating: NewRating) -> Result<Rating> {
        let _guard = self.catalog_writes.lock().await;

        if query::get_movie(&self.client, rating.movie_id).await?.is_none() {
            return Err(Error::not_found(format!("movie {}", rating.movie_id)));
        }

        // Stored with millisecond precision
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        let rating = Rating {
            id: query::max_id(&self.client, APP_RATINGS).await? + 1,
            movie_id: rating.movie_id,
            user_id: rating.user_id,
            rating: rating.rating,
            created_at,
        };
        insert::write_ratings(
            &self.client,
            &[AppRatingRow::new(&rating, self.next_version(), false)],
        )
        .await?;
        Ok(rating)
    }
}
