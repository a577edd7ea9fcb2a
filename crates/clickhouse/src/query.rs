//! Read queries: staging, warehouse, marts, quality metrics, catalogue.

use crate::client::{observe, ClickHouseClient};
use crate::insert::{
    AppMovieRow, AppRatingRow, DwMovieRow, DwRatingRow, DwUserRow, StgMovieRow, StgRatingRow,
    StgUserRow,
};
use clickhouse::Row;
use etl_core::{
    AvgByAgeRow, Movie, QualityMetric, Rating, RatingsByCountryRow, Result, StagingBatch,
    TopByGenreRow, WarehouseSnapshot, METRIC_MOVIES_YEAR_NULL, METRIC_RATINGS_OUT_OF_RANGE,
    METRIC_USERS_AGE_UNKNOWN,
};
use serde::Deserialize;
use std::time::Instant;

/// Reads staging back in file order.
pub async fn read_staging(client: &ClickHouseClient) -> Result<StagingBatch> {
    let start = Instant::now();
    let movies = client
        .inner()
        .query("SELECT source_line, id, title, year, genre, imdb_id FROM stg.movies ORDER BY source_line")
        .fetch_all::<StgMovieRow>()
        .await;
    let movies = observe(start, movies, "read stg.movies")?;

    let start = Instant::now();
    let users = client
        .inner()
        .query("SELECT source_line, id, age_range, country FROM stg.users ORDER BY source_line")
        .fetch_all::<StgUserRow>()
        .await;
    let users = observe(start, users, "read stg.users")?;

    let start = Instant::now();
    let ratings = client
        .inner()
        .query("SELECT source_line, user_id, movie_id, rating, created_at FROM stg.ratings ORDER BY source_line")
        .fetch_all::<StgRatingRow>()
        .await;
    let ratings = observe(start, ratings, "read stg.ratings")?;

    Ok(StagingBatch {
        movies: movies.into_iter().map(Into::into).collect(),
        users: users.into_iter().map(Into::into).collect(),
        ratings: ratings.into_iter().map(Into::into).collect(),
    })
}

/// Reads the warehouse ordered by primary key.
pub async fn read_warehouse(client: &ClickHouseClient) -> Result<WarehouseSnapshot> {
    let start = Instant::now();
    let movies = client
        .inner()
        .query("SELECT id, title, year, genre, imdb_id FROM dw.movies ORDER BY id")
        .fetch_all::<DwMovieRow>()
        .await;
    let movies = observe(start, movies, "read dw.movies")?;

    let start = Instant::now();
    let users = client
        .inner()
        .query("SELECT id, age_range, country FROM dw.users ORDER BY id")
        .fetch_all::<DwUserRow>()
        .await;
    let users = observe(start, users, "read dw.users")?;

    let start = Instant::now();
    let ratings = client
        .inner()
        .query("SELECT id, user_id, movie_id, rating, created_at FROM dw.ratings ORDER BY id")
        .fetch_all::<DwRatingRow>()
        .await;
    let ratings = observe(start, ratings, "read dw.ratings")?;

    Ok(WarehouseSnapshot {
        movies: movies.into_iter().map(Into::into).collect(),
        users: users.into_iter().map(Into::into).collect(),
        ratings: ratings.into_iter().map(Into::into).collect(),
    })
}

// ============================================================================
// Marts
// ============================================================================

#[derive(Debug, Clone, Row, Deserialize)]
struct TopByGenreQueryRow {
    genre: String,
    movie_id: i32,
    title: String,
    avg_rating: f64,
    n_ratings: u64,
}

#[derive(Debug, Clone, Row, Deserialize)]
struct AvgByAgeQueryRow {
    age_range: String,
    avg_rating: f64,
    n: u64,
}

#[derive(Debug, Clone, Row, Deserialize)]
struct ByCountryQueryRow {
    country: String,
    n: u64,
}

/// Reads `mart.top10_by_genre`.
pub async fn top_by_genre(client: &ClickHouseClient) -> Result<Vec<TopByGenreRow>> {
    let start = Instant::now();
    let rows = client
        .inner()
        .query("SELECT genre, movie_id, title, avg_rating, n_ratings FROM mart.top10_by_genre \
             ORDER BY genre ASC, avg_rating DESC, n_ratings DESC, title ASC, movie_id ASC")
        .fetch_all::<TopByGenreQueryRow>()
        .await;
    Ok(observe(start, rows, "read mart.top10_by_genre")?
        .into_iter()
        .map(|r| TopByGenreRow {
            genre: r.genre,
            movie_id: r.movie_id,
            title: r.title,
            avg_rating: r.avg_rating,
            n_ratings: r.n_ratings,
        })
        .collect())
}

/// Reads `mart.avg_by_age_range`.
pub async fn avg_by_age(client: &ClickHouseClient) -> Result<Vec<AvgByAgeRow>> {
    let start = Instant::now();
    let rows = client
        .inner()
        .query("SELECT age_range, avg_rating, n FROM mart.avg_by_age_range ORDER BY avg_rating DESC, age_range ASC")
        .fetch_all::<AvgByAgeQueryRow>()
        .await;
    Ok(observe(start, rows, "read mart.avg_by_age_range")?
        .into_iter()
        .map(|r| AvgByAgeRow {
            age_range: r.age_range,
            avg_rating: r.avg_rating,
            n: r.n,
        })
        .collect())
}

/// Reads `mart.ratings_by_country`.
pub async fn ratings_by_country(client: &ClickHouseClient) -> Result<Vec<RatingsByCountryRow>> {
    let start = Instant::now();
    let rows = client
        .inner()
        .query("SELECT country, n FROM mart.ratings_by_country ORDER BY n DESC, country ASC")
        .fetch_all::<ByCountryQueryRow>()
        .await;
    Ok(observe(start, rows, "read mart.ratings_by_country")?
        .into_iter()
        .map(|r| RatingsByCountryRow {
            country: r.country,
            n: r.n,
        })
        .collect())
}

async fn scalar(client: &ClickHouseClient, sql: &str) -> Result<u64> {
    let start = Instant::now();
    let res = client.inner().query(sql).fetch_one::<u64>().await;
    observe(start, res, "scalar")
}

/// Data-quality counters over the warehouse.
pub async fn quality_metrics(client: &ClickHouseClient) -> Result<Vec<QualityMetric>> {
    let out_of_range = scalar(
        client,
        "SELECT count() FROM dw.ratings WHERE rating < 0 OR rating > 10",
    )
    .await?;
    let age_unknown = scalar(
        client,
        "SELECT count() FROM dw.users WHERE age_range = '' OR age_range = 'UNKNOWN'",
    )
    .await?;
    let year_null = scalar(client, "SELECT count() FROM dw.movies WHERE year IS NULL").await?;

    Ok(vec![
        QualityMetric::new(METRIC_RATINGS_OUT_OF_RANGE, out_of_range),
        QualityMetric::new(METRIC_USERS_AGE_UNKNOWN, age_unknown),
        QualityMetric::new(METRIC_MOVIES_YEAR_NULL, year_null),
    ])
}

// ============================================================================
// Catalogue
// ============================================================================

const APP_MOVIE_COLUMNS: &str = "id, title, year, genre, imdb_id, version, is_deleted";
const APP_RATING_COLUMNS: &str = "id, movie_id, user_id, rating, created_at, version, is_deleted";

/// Live movies ordered by id.
pub async fn list_movies(client: &ClickHouseClient) -> Result<Vec<Movie>> {
    let sql = format!(
        "SELECT {} FROM app.movies FINAL WHERE is_deleted = 0 ORDER BY id",
        APP_MOVIE_COLUMNS
    );
    let start = Instant::now();
    let rows = client.inner().query(&sql).fetch_all::<AppMovieRow>().await;
    Ok(observe(start, rows, "list app.movies")?
        .into_iter()
        .map(Into::into)
        .collect())
}

pub async fn get_movie(client: &ClickHouseClient, id: u64) -> Result<Option<Movie>> {
    let sql = format!(
        "SELECT {} FROM app.movies FINAL WHERE id = ? AND is_deleted = 0",
        APP_MOVIE_COLUMNS
    );
    let start = Instant::now();
    let row = client
        .inner()
        .query(&sql)
        .bind(id)
        .fetch_optional::<AppMovieRow>()
        .await;
    Ok(observe(start, row, "get app.movies")?.map(Into::into))
}

/// Live ratings ordered by id, optionally of one movie.
pub async fn list_ratings(client: &ClickHouseClient, movie_id: Option<u64>) -> Result<Vec<Rating>> {
    let start = Instant::now();
    let rows = match movie_id {
        Some(movie_id) => {
            let sql = format!(
                "SELECT {} FROM app.ratings FINAL WHERE is_deleted = 0 AND movie_id = ? ORDER BY id",
                APP_RATING_COLUMNS
            );
            client
                .inner()
                .query(&sql)
                .bind(movie_id)
                .fetch_all::<AppRatingRow>()
                .await
        }
        None => {
            let sql = format!(
                "SELECT {} FROM app.ratings FINAL WHERE is_deleted = 0 ORDER BY id",
                APP_RATING_COLUMNS
            );
            client.inner().query(&sql).fetch_all::<AppRatingRow>().await
        }
    };
    Ok(observe(start, rows, "list app.ratings")?
        .into_iter()
        .map(Into::into)
        .collect())
}

pub async fn get_rating(client: &ClickHouseClient, id: u64) -> Result<Option<Rating>> {
    let sql = format!(
        "SELECT {} FROM app.ratings FINAL WHERE id = ? AND is_deleted = 0",
        APP_RATING_COLUMNS
    );
    let start = Instant::now();
    let row = client
        .inner()
        .query(&sql)
        .bind(id)
        .fetch_optional::<AppRatingRow>()
        .await;
    Ok(observe(start, row, "get app.ratings")?.map(Into::into))
}

/// Highest id ever used in a catalogue table, deleted rows included.
pub async fn max_id(client: &ClickHouseClient, table: &str) -> Result<u64> {
    scalar(client, &format!("SELECT max(id) FROM {}", table)).await
}
