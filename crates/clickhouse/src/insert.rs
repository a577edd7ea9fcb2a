//! Row types and writers for every ClickHouse table.
//!
//! `DateTime64(3)` columns travel as milliseconds since epoch.

use crate::client::ClickHouseClient;
use crate::schema::{self, APP_MOVIES, APP_RATINGS, STG_MOVIES, STG_RATINGS, STG_USERS};
use chrono::{DateTime, Utc};
use clickhouse::Row;
use etl_core::{
    DwMovie, DwRating, DwUser, Movie, Rating, Result, StagingBatch, StagingCounts, StgMovie,
    StgRating, StgUser, WarehouseCounts, WarehouseSnapshot,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info};

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

// ============================================================================
// Staging
// ============================================================================

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct StgMovieRow {
    pub source_line: u64,
    pub id: i32,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub imdb_id: Option<String>,
}

impl From<&StgMovie> for StgMovieRow {
    fn from(m: &StgMovie) -> Self {
        Self {
            source_line: m.source_line,
            id: m.id,
            title: m.title.clone(),
            year: m.year,
            genre: m.genre.clone(),
            imdb_id: m.imdb_id.clone(),
        }
    }
}

impl From<StgMovieRow> for StgMovie {
    fn from(r: StgMovieRow) -> Self {
        Self {
            source_line: r.source_line,
            id: r.id,
            title: r.title,
            year: r.year,
            genre: r.genre,
            imdb_id: r.imdb_id,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct StgUserRow {
    pub source_line: u64,
    pub id: i32,
    pub age_range: Option<String>,
    pub country: Option<String>,
}

impl From<&StgUser> for StgUserRow {
    fn from(u: &StgUser) -> Self {
        Self {
            source_line: u.source_line,
            id: u.id,
            age_range: u.age_range.clone(),
            country: u.country.clone(),
        }
    }
}

impl From<StgUserRow> for StgUser {
    fn from(r: StgUserRow) -> Self {
        Self {
            source_line: r.source_line,
            id: r.id,
            age_range: r.age_range,
            country: r.country,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct StgRatingRow {
    pub source_line: u64,
    pub user_id: i32,
    pub movie_id: i32,
    pub rating: Option<f64>,
    pub created_at: Option<i64>,
}

impl From<&StgRating> for StgRatingRow {
    fn from(r: &StgRating) -> Self {
        Self {
            source_line: r.source_line,
            user_id: r.user_id,
            movie_id: r.movie_id,
            rating: r.rating,
            created_at: r.created_at.map(to_millis),
        }
    }
}

impl From<StgRatingRow> for StgRating {
    fn from(r: StgRatingRow) -> Self {
        Self {
            source_line: r.source_line,
            user_id: r.user_id,
            movie_id: r.movie_id,
            rating: r.rating,
            created_at: r.created_at.and_then(from_millis),
        }
    }
}

/// Truncates the staging tables and loads the batch.
pub async fn replace_staging(
    client: &ClickHouseClient,
    batch: &StagingBatch,
) -> Result<StagingCounts> {
    let start = Instant::now();

    for table in [STG_MOVIES, STG_USERS, STG_RATINGS] {
        client
            .execute(&format!("TRUNCATE TABLE IF EXISTS {}", table))
            .await?;
    }

    let movies: Vec<StgMovieRow> = batch.movies.iter().map(StgMovieRow::from).collect();
    let users: Vec<StgUserRow> = batch.users.iter().map(StgUserRow::from).collect();
    let ratings: Vec<StgRatingRow> = batch.ratings.iter().map(StgRatingRow::from).collect();

    let counts = StagingCounts {
        movies: client.insert_rows(STG_MOVIES, &movies).await?,
        users: client.insert_rows(STG_USERS, &users).await?,
        ratings: client.insert_rows(STG_RATINGS, &ratings).await?,
    };

    debug!(
        movies = counts.movies,
        users = counts.users,
        ratings = counts.ratings,
        latency_ms = %start.elapsed().as_millis(),
        "Staging loaded"
    );

    Ok(counts)
}

// ============================================================================
// Warehouse
// ============================================================================

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct DwMovieRow {
    pub id: i32,
    pub title: String,
    pub year: Option<i32>,
    pub genre: String,
    pub imdb_id: Option<String>,
}

impl From<&DwMovie> for DwMovieRow {
    fn from(m: &DwMovie) -> Self {
        Self {
            id: m.id,
            title: m.title.clone(),
            year: m.year,
            genre: m.genre.clone(),
            imdb_id: m.imdb_id.clone(),
        }
    }
}

impl From<DwMovieRow> for DwMovie {
    fn from(r: DwMovieRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            year: r.year,
            genre: r.genre,
            imdb_id: r.imdb_id,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct DwUserRow {
    pub id: i32,
    pub age_range: String,
    pub country: String,
}

impl From<&DwUser> for DwUserRow {
    fn from(u: &DwUser) -> Self {
        Self {
            id: u.id,
            age_range: u.age_range.clone(),
            country: u.country.clone(),
        }
    }
}

impl From<DwUserRow> for DwUser {
    fn from(r: DwUserRow) -> Self {
        Self {
            id: r.id,
            age_range: r.age_range,
            country: r.country,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct DwRatingRow {
    pub id: u64,
    pub user_id: i32,
    pub movie_id: i32,
    pub rating: f64,
    pub created_at: Option<i64>,
}

impl From<&DwRating> for DwRatingRow {
    fn from(r: &DwRating) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            movie_id: r.movie_id,
            rating: r.rating,
            created_at: r.created_at.map(to_millis),
        }
    }
}

impl From<DwRatingRow> for DwRating {
    fn from(r: DwRatingRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            movie_id: r.movie_id,
            rating: r.rating,
            created_at: r.created_at.and_then(from_millis),
        }
    }
}

/// Recreates the shadow of `table` from scratch.
async fn reset_shadow(
    client: &ClickHouseClient,
    table: &str,
    ddl: fn(&str) -> String,
) -> Result<String> {
    let shadow = schema::shadow_of(table);
    client
        .execute(&format!("DROP TABLE IF EXISTS {}", shadow))
        .await?;
    client.execute(&ddl(&shadow)).await?;
    Ok(shadow)
}

/// Replaces the warehouse.
///
/// All three shadows are written first; the live tables are only swapped
/// once every shadow is complete, so a failed write leaves them intact.
pub async fn replace_warehouse(
    client: &ClickHouseClient,
    snapshot: &WarehouseSnapshot,
) -> Result<WarehouseCounts> {
    let start = Instant::now();

    let mut shadows = Vec::with_capacity(schema::DW_TABLES.len());
    for (table, ddl) in schema::DW_TABLES {
        // Live table must exist for EXCHANGE
        client.execute(&ddl(table)).await?;
        shadows.push((table, reset_shadow(client, table, ddl).await?));
    }

    let movies: Vec<DwMovieRow> = snapshot.movies.iter().map(DwMovieRow::from).collect();
    let users: Vec<DwUserRow> = snapshot.users.iter().map(DwUserRow::from).collect();
    let ratings: Vec<DwRatingRow> = snapshot.ratings.iter().map(DwRatingRow::from).collect();

    let counts = WarehouseCounts {
        movies: client.insert_rows(&shadows[0].1, &movies).await?,
        users: client.insert_rows(&shadows[1].1, &users).await?,
        ratings: client.insert_rows(&shadows[2].1, &ratings).await?,
    };

    for (table, shadow) in &shadows {
        client
            .execute(&format!("EXCHANGE TABLES {} AND {}", shadow, table))
            .await?;
        client
            .execute(&format!("DROP TABLE IF EXISTS {}", shadow))
            .await?;
    }

    metrics()
        .warehouse_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    info!(
        movies = counts.movies,
        users = counts.users,
        ratings = counts.ratings,
        latency_ms = %start.elapsed().as_millis(),
        "Warehouse swapped in"
    );

    Ok(counts)
}

// ============================================================================
// Catalogue
// ============================================================================

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct AppMovieRow {
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub imdb_id: Option<String>,
    pub version: u64,
    pub is_deleted: u8,
}

impl AppMovieRow {
    pub fn new(movie: &Movie, version: u64, deleted: bool) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            year: movie.year,
            genre: movie.genre.clone(),
            imdb_id: movie.imdb_id.clone(),
            version,
            is_deleted: u8::from(deleted),
        }
    }
}

impl From<AppMovieRow> for Movie {
    fn from(r: AppMovieRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            year: r.year,
            genre: r.genre,
            imdb_id: r.imdb_id,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct AppRatingRow {
    pub id: u64,
    pub movie_id: u64,
    pub user_id: Option<u64>,
    pub rating: f64,
    pub created_at: i64,
    pub version: u64,
    pub is_deleted: u8,
}

impl AppRatingRow {
    pub fn new(rating: &Rating, version: u64, deleted: bool) -> Self {
        Self {
            id: rating.id,
            movie_id: rating.movie_id,
            user_id: rating.user_id,
            rating: rating.rating,
            created_at: to_millis(rating.created_at),
            version,
            is_deleted: u8::from(deleted),
        }
    }
}

impl From<AppRatingRow> for Rating {
    fn from(r: AppRatingRow) -> Self {
        Self {
            id: r.id,
            movie_id: r.movie_id,
            user_id: r.user_id,
            rating: r.rating,
            created_at: from_millis(r.created_at).unwrap_or_default(),
        }
    }
}

/// Writes a new version of a movie row.
pub async fn write_movie(client: &ClickHouseClient, row: AppMovieRow) -> Result<()> {
    client.insert_rows(APP_MOVIES, &[row]).await?;
    Ok(())
}

/// Writes new versions of rating rows.
pub async fn write_ratings(client: &ClickHouseClient, rows: &[AppRatingRow]) -> Result<usize> {
    client.insert_rows(APP_RATINGS, rows).await
}
