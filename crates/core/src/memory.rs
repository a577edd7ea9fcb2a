//! In-process store.
//!
//! Backs `store = "memory"` deployments and the HTTP tests. The warehouse
//! is swapped as a whole under one write lock; marts are computed on read.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use crate::catalog::{Movie, NewMovie, NewRating, Rating};
use crate::error::{Error, Result};
use crate::mart::{self, AvgByAgeRow, RatingsByCountryRow, TopByGenreRow};
use crate::staging::{StagingBatch, StagingCounts};
use crate::store::{CatalogStore, WarehouseStore};
use crate::warehouse::{self, QualityMetric, WarehouseCounts, WarehouseSnapshot};

#[derive(Default)]
struct Catalog {
    movies: BTreeMap<u64, Movie>,
    ratings: BTreeMap<u64, Rating>,
    last_movie_id: u64,
    last_rating_id: u64,
}

/// Store holding every layer in memory.
#[derive(Default)]
pub struct MemoryStore {
    staging: RwLock<StagingBatch>,
    warehouse: RwLock<WarehouseSnapshot>,
    catalog: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WarehouseStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn replace_staging(&self, batch: &StagingBatch) -> Result<StagingCounts> {
        let mut batch = batch.clone();
        batch.sort_by_line();
        let counts = batch.counts();
        *self.staging.write() = batch;
        debug!(total = counts.total(), "Staging replaced");
        Ok(counts)
    }

    async fn read_staging(&self) -> Result<StagingBatch> {
        Ok(self.staging.read().clone())
    }

    async fn replace_warehouse(&self, snapshot: &WarehouseSnapshot) -> Result<WarehouseCounts> {
        let mut snapshot = snapshot.clone();
        snapshot.sort_by_key();
        let counts = snapshot.counts();
        *self.warehouse.write() = snapshot;
        Ok(counts)
    }

    async fn define_marts(&self) -> Result<()> {
        Ok(())
    }

    async fn read_warehouse(&self) -> Result<WarehouseSnapshot> {
        Ok(self.warehouse.read().clone())
    }

    async fn top_by_genre(&self) -> Result<Vec<TopByGenreRow>> {
        Ok(mart::top_by_genre(&self.warehouse.read()))
    }

    async fn avg_by_age(&self) -> Result<Vec<AvgByAgeRow>> {
        Ok(mart::avg_by_age(&self.warehouse.read()))
    }

    async fn ratings_by_country(&self) -> Result<Vec<RatingsByCountryRow>> {
        Ok(mart::ratings_by_country(&self.warehouse.read()))
    }

    async fn quality_metrics(&self) -> Result<Vec<QualityMetric>> {
        Ok(warehouse::quality_metrics(&self.warehouse.read()))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_movies(&self) -> Result<Vec<Movie>> {
        Ok(self.catalog.read().movies.values().cloned().collect())
    }

    async fn get_movie(&self, id: u64) -> Result<Option<Movie>> {
        Ok(self.catalog.read().movies.get(&id).cloned())
    }

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie> {
        let mut catalog = self.catalog.write();
        catalog.last_movie_id += 1;
        let movie = Movie {
            id: catalog.last_movie_id,
            title: movie.title,
            year: movie.year,
            genre: movie.genre,
            imdb_id: movie.imdb_id,
        };
        catalog.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn update_movie(&self, id: u64, movie: NewMovie) -> Result<Option<Movie>> {
        let mut catalog = self.catalog.write();
        let Some(existing) = catalog.movies.get_mut(&id) else {
            return Ok(None);
        };
        existing.title = movie.title;
        existing.year = movie.year;
        existing.genre = movie.genre;
        existing.imdb_id = movie.imdb_id;
        Ok(Some(existing.clone()))
    }

    async fn delete_movie(&self, id: u64) -> Result<bool> {
        let mut catalog = self.catalog.write();
        if catalog.movies.remove(&id).is_none() {
            return Ok(false);
        }
        catalog.ratings.retain(|_, r| r.movie_id != id);
        Ok(true)
    }

    async fn list_ratings(&self, movie_id: Option<u64>) -> Result<Vec<Rating>> {
        Ok(self
            .catalog
            .read()
            .ratings
            .values()
            .filter(|r| movie_id.map_or(true, |m| r.movie_id == m))
            .cloned()
            .collect())
    }

    async fn get_rating(&self, id: u64) -> Result<Option<Rating>> {
        Ok(self.catalog.read().ratings.get(&id).cloned())
    }

    async fn create_rating(&self, rating: NewRating) -> Result<Rating> {
        let mut catalog = self.catalog.write();
        if !catalog.movies.contains_key(&rating.movie_id) {
            return Err(Error::not_found(format!("movie {}", rating.movie_id)));
        }
        catalog.last_rating_id += 1;
        let rating = Rating {
            id: catalog.last_rating_id,
            movie_id: rating.movie_id,
            user_id: rating.user_id,
            rating: rating.rating,
            created_at: Utc::now(),
        };
        catalog.ratings.insert(rating.id, rating.clone());
        Ok(rating)
    }
}
