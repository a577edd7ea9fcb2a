//! Staging-layer rows.
//!
//! Staging mirrors the canonical CSV shape column-for-column. The only
//! extra column is `source_line`, the 1-based line of the record in its
//! file, so the warehouse builder can replay staging in file order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of `movies.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StgMovie {
    pub source_line: u64,
    pub id: i32,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub imdb_id: Option<String>,
}

/// Row of `users.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StgUser {
    pub source_line: u64,
    pub id: i32,
    pub age_range: Option<String>,
    pub country: Option<String>,
}

/// Row of `ratings.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StgRating {
    pub source_line: u64,
    pub user_id: i32,
    pub movie_id: i32,
    pub rating: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Full contents of the staging layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingBatch {
    pub movies: Vec<StgMovie>,
    pub users: Vec<StgUser>,
    pub ratings: Vec<StgRating>,
}

impl StagingBatch {
    pub fn counts(&self) -> StagingCounts {
        StagingCounts {
            movies: self.movies.len(),
            users: self.users.len(),
            ratings: self.ratings.len(),
        }
    }

    /// Orders every table by `source_line`.
    pub fn sort_by_line(&mut self) {
        self.movies.sort_by_key(|r| r.source_line);
        self.users.sort_by_key(|r| r.source_line);
        self.ratings.sort_by_key(|r| r.source_line);
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.users.is_empty() && self.ratings.is_empty()
    }
}

/// Row counts per staging table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingCounts {
    pub movies: usize,
    pub users: usize,
    pub ratings: usize,
}

impl StagingCounts {
    pub fn total(&self) -> usize {
        self.movies + self.users + self.ratings
    }
}
