//! Warehouse-layer rows and data-quality metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::{rating_in_range, UNKNOWN};

/// Normalized movie, unique by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwMovie {
    pub id: i32,
    pub title: String,
    pub year: Option<i32>,
    pub genre: String,
    pub imdb_id: Option<String>,
}

/// Normalized user, unique by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwUser {
    pub id: i32,
    pub age_range: String,
    pub country: String,
}

/// Rating fact. `id` is a surrogate assigned in staging order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwRating {
    pub id: u64,
    pub user_id: i32,
    pub movie_id: i32,
    pub rating: f64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Full contents of the warehouse layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSnapshot {
    pub movies: Vec<DwMovie>,
    pub users: Vec<DwUser>,
    pub ratings: Vec<DwRating>,
}

impl WarehouseSnapshot {
    pub fn counts(&self) -> WarehouseCounts {
        WarehouseCounts {
            movies: self.movies.len(),
            users: self.users.len(),
            ratings: self.ratings.len(),
        }
    }

    /// Orders tables by primary key, the order exports and comparisons use.
    pub fn sort_by_key(&mut self) {
        self.movies.sort_by_key(|m| m.id);
        self.users.sort_by_key(|u| u.id);
        self.ratings.sort_by_key(|r| r.id);
    }
}

/// Row counts per warehouse table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCounts {
    pub movies: usize,
    pub users: usize,
    pub ratings: usize,
}

impl WarehouseCounts {
    pub fn total(&self) -> usize {
        self.movies + self.users + self.ratings
    }
}

/// One data-quality counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub metric: String,
    pub value: u64,
}

impl QualityMetric {
    pub fn new(metric: &str, value: u64) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }
}

pub const METRIC_RATINGS_OUT_OF_RANGE: &str = "ratings_out_of_range";
pub const METRIC_USERS_AGE_UNKNOWN: &str = "users_age_unknown";
pub const METRIC_MOVIES_YEAR_NULL: &str = "movies_year_null";

/// Computes the quality counters over a warehouse snapshot.
pub fn quality_metrics(snapshot: &WarehouseSnapshot) -> Vec<QualityMetric> {
    let out_of_range = snapshot
        .ratings
        .iter()
        .filter(|r| !rating_in_range(r.rating))
        .count();
    let age_unknown = snapshot
        .users
        .iter()
        .filter(|u| u.age_range.is_empty() || u.age_range == UNKNOWN)
        .count();
    let year_null = snapshot.movies.iter().filter(|m| m.year.is_none()).count();

    vec![
        QualityMetric::new(METRIC_RATINGS_OUT_OF_RANGE, out_of_range as u64),
        QualityMetric::new(METRIC_USERS_AGE_UNKNOWN, age_unknown as u64),
        QualityMetric::new(METRIC_MOVIES_YEAR_NULL, year_null as u64),
    ]
}
