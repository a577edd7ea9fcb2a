//! Application catalogue: movies and ratings served by the CRUD API.
//!
//! These live in their own schema and are never touched by a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result, ValidationErrorCode};
use crate::limits::round_rating;

/// Movie as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub imdb_id: Option<String>,
}

/// Movie create/update request body.
///
/// Bounds mirror `limits::{MAX_TITLE_LEN, MAX_GENRE_LEN, MAX_IMDB_ID_LEN}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MovieInput {
    #[validate(required, length(min = 1, max = 300))]
    pub title: Option<String>,
    #[validate(range(min = 1870, max = 2100))]
    pub year: Option<i32>,
    #[validate(length(max = 64))]
    pub genre: Option<String>,
    #[validate(length(max = 16))]
    pub imdb_id: Option<String>,
}

/// Validated movie fields ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub title: String,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub imdb_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::validation_code(ValidationErrorCode::InvalidField, msg)
}

impl MovieInput {
    /// Validates the body and trims its text fields.
    pub fn into_new(self) -> Result<NewMovie> {
        self.validate().map_err(|e| invalid(format!("{}", e)))?;

        let title = non_blank(self.title).ok_or_else(|| invalid("title is required"))?;
        Ok(NewMovie {
            title,
            year: self.year,
            genre: non_blank(self.genre),
            imdb_id: non_blank(self.imdb_id),
        })
    }
}

/// Rating as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: u64,
    pub movie_id: u64,
    pub user_id: Option<u64>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

/// Rating create request body.
///
/// Range mirrors `limits::{MIN_RATING, MAX_RATING}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    #[validate(required)]
    pub movie_id: Option<u64>,
    pub user_id: Option<u64>,
    #[validate(required, range(min = 0.0, max = 10.0))]
    pub rating: Option<f64>,
}

/// Validated rating fields ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub movie_id: u64,
    pub user_id: Option<u64>,
    pub rating: f64,
}

impl RatingInput {
    pub fn into_new(self) -> Result<NewRating> {
        self.validate().map_err(|e| invalid(format!("{}", e)))?;

        let movie_id = self.movie_id.ok_or_else(|| invalid("movieId is required"))?;
        let rating = self.rating.ok_or_else(|| invalid("rating is required"))?;
        Ok(NewRating {
            movie_id,
            user_id: self.user_id,
            rating: round_rating(rating),
        })
    }
}
