//! ClickHouse schemas.
//!
//! Layout:
//! - `stg`  raw CSV shape plus `source_line`, truncated every run
//! - `dw`   normalized tables, replaced through `<table>_next` shadows
//! - `mart` views over `dw`
//! - `app`  catalogue tables, `ReplacingMergeTree(version, is_deleted)`
//!
//! Rating ranges are also enforced by CHECK constraints.

use crate::client::ClickHouseClient;
use etl_core::Result;
use tracing::debug;

pub const DATABASES: [&str; 4] = ["stg", "dw", "mart", "app"];

pub const STG_MOVIES: &str = "stg.movies";
pub const STG_USERS: &str = "stg.users";
pub const STG_RATINGS: &str = "stg.ratings";

pub const DW_MOVIES: &str = "dw.movies";
pub const DW_USERS: &str = "dw.users";
pub const DW_RATINGS: &str = "dw.ratings";

pub const MART_TOP_BY_GENRE: &str = "mart.top10_by_genre";
pub const MART_AVG_BY_AGE: &str = "mart.avg_by_age_range";
pub const MART_RATINGS_BY_COUNTRY: &str = "mart.ratings_by_country";

pub const APP_MOVIES: &str = "app.movies";
pub const APP_RATINGS: &str = "app.ratings";

/// Suffix of warehouse shadow tables.
pub const SHADOW_SUFFIX: &str = "_next";

pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", name)
}

pub const CREATE_STG_MOVIES: &str = r#"
CREATE TABLE IF NOT EXISTS stg.movies (
    source_line UInt64,
    id Int32,
    title Nullable(String),
    year Nullable(Int32),
    genre Nullable(String),
    imdb_id Nullable(String)
)
ENGINE = MergeTree()
ORDER BY source_line
"#;

pub const CREATE_STG_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS stg.users (
    source_line UInt64,
    id Int32,
    age_range Nullable(String),
    country Nullable(String)
)
ENGINE = MergeTree()
ORDER BY source_line
"#;

pub const CREATE_STG_RATINGS: &str = r#"
CREATE TABLE IF NOT EXISTS stg.ratings (
    source_line UInt64,
    user_id Int32,
    movie_id Int32,
    rating Nullable(Float64),
    created_at Nullable(DateTime64(3, 'UTC'))
)
ENGINE = MergeTree()
ORDER BY source_line
"#;

/// DDL for `dw.movies` or its shadow.
pub fn create_dw_movies(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id Int32,
    title String,
    year Nullable(Int32),
    genre LowCardinality(String),
    imdb_id Nullable(String)
)
ENGINE = MergeTree()
ORDER BY id
"#
    )
}

/// DDL for `dw.users` or its shadow.
pub fn create_dw_users(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id Int32,
    age_range LowCardinality(String),
    country LowCardinality(String)
)
ENGINE = MergeTree()
ORDER BY id
"#
    )
}

/// DDL for `dw.ratings` or its shadow.
pub fn create_dw_ratings(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id UInt64,
    user_id Int32,
    movie_id Int32,
    rating Float64,
    created_at Nullable(DateTime64(3, 'UTC')),
    CONSTRAINT rating_range CHECK rating >= 0 AND rating <= 10
)
ENGINE = MergeTree()
ORDER BY id
"#
    )
}

/// Warehouse tables with their DDL builders, in load order.
pub const DW_TABLES: [(&str, fn(&str) -> String); 3] = [
    (DW_MOVIES, create_dw_movies),
    (DW_USERS, create_dw_users),
    (DW_RATINGS, create_dw_ratings),
];

pub fn shadow_of(table: &str) -> String {
    format!("{}{}", table, SHADOW_SUFFIX)
}

pub const CREATE_MART_TOP_BY_GENRE: &str = r#"
CREATE OR REPLACE VIEW mart.top10_by_genre AS
SELECT genre, movie_id, title, avg_rating, n_ratings
FROM (
    SELECT
        genre, movie_id, title, avg_rating, n_ratings,
        row_number() OVER (
            PARTITION BY genre
            ORDER BY avg_rating DESC, n_ratings DESC, title ASC, movie_id ASC
        ) AS genre_rank
    FROM (
        SELECT
            m.genre AS genre,
            m.id AS movie_id,
            m.title AS title,
            toFloat64(round(toDecimal64(avg(r.rating), 6), 2)) AS avg_rating,
            count() AS n_ratings
        FROM dw.ratings AS r
        INNER JOIN dw.movies AS m ON r.movie_id = m.id
        GROUP BY m.genre, m.id, m.title
    )
)
WHERE genre_rank <= 10
ORDER BY genre ASC, avg_rating DESC, n_ratings DESC, title ASC, movie_id ASC
"#;

pub const CREATE_MART_AVG_BY_AGE: &str = r#"
CREATE OR REPLACE VIEW mart.avg_by_age_range AS
SELECT
    u.age_range AS age_range,
    toFloat64(round(toDecimal64(avg(r.rating), 6), 2)) AS avg_rating,
    count() AS n
FROM dw.ratings AS r
INNER JOIN dw.users AS u ON r.user_id = u.id
GROUP BY u.age_range
ORDER BY avg_rating DESC, age_range ASC
"#;

pub const CREATE_MART_RATINGS_BY_COUNTRY: &str = r#"
CREATE OR REPLACE VIEW mart.ratings_by_country AS
SELECT
    u.country AS country,
    count() AS n
FROM dw.ratings AS r
INNER JOIN dw.users AS u ON r.user_id = u.id
GROUP BY u.country
ORDER BY n DESC, country ASC
"#;

pub const CREATE_APP_MOVIES: &str = r#"
CREATE TABLE IF NOT EXISTS app.movies (
    id UInt64,
    title String,
    year Nullable(Int32),
    genre Nullable(String),
    imdb_id Nullable(String),
    version UInt64,
    is_deleted UInt8
)
ENGINE = ReplacingMergeTree(version, is_deleted)
ORDER BY id
"#;

pub const CREATE_APP_RATINGS: &str = r#"
CREATE TABLE IF NOT EXISTS app.ratings (
    id UInt64,
    movie_id UInt64,
    user_id Nullable(UInt64),
    rating Float64,
    created_at DateTime64(3, 'UTC'),
    version UInt64,
    is_deleted UInt8,
    CONSTRAINT rating_range CHECK rating >= 0 AND rating <= 10
)
ENGINE = ReplacingMergeTree(version, is_deleted)
ORDER BY id
"#;

/// Mart view definitions.
pub fn mart_views() -> Vec<&'static str> {
    vec![
        CREATE_MART_TOP_BY_GENRE,
        CREATE_MART_AVG_BY_AGE,
        CREATE_MART_RATINGS_BY_COUNTRY,
    ]
}

/// Every statement needed on an empty server, in dependency order.
pub fn all_statements() -> Vec<String> {
    let mut stmts: Vec<String> = DATABASES.iter().map(|db| create_database(db)).collect();
    stmts.extend(
        [CREATE_STG_MOVIES, CREATE_STG_USERS, CREATE_STG_RATINGS]
            .iter()
            .map(|s| s.to_string()),
    );
    stmts.extend(DW_TABLES.iter().map(|(table, ddl)| ddl(table)));
    stmts.extend(mart_views().into_iter().map(str::to_string));
    stmts.push(CREATE_APP_MOVIES.to_string());
    stmts.push(CREATE_APP_RATINGS.to_string());
    stmts
}

/// Initialize the database schema.
///
/// Creates the databases and every table and view that does not exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    for sql in all_statements() {
        client.execute(&sql).await?;
    }
    debug!("ClickHouse schema initialized");
    Ok(())
}

/// (Re)defines the mart views.
pub async fn define_marts(client: &ClickHouseClient) -> Result<()> {
    for sql in mart_views() {
        client.execute(sql).await?;
    }
    Ok(())
}
