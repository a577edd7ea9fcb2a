//! Bounds shared by the warehouse builder, the marts and the catalogue API.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so the rating and title bounds are duplicated in `catalog.rs`. Keep
//! both in sync when modifying.

// === Ratings ===

/// Lowest accepted rating value.
pub const MIN_RATING: f64 = 0.0;

/// Highest accepted rating value.
pub const MAX_RATING: f64 = 10.0;

/// Ratings are stored with one decimal.
pub const RATING_SCALE: f64 = 10.0;

// === Marts ===

/// Movies kept per genre in the top-by-genre mart.
pub const TOP_N_PER_GENRE: usize = 10;

/// Averages exposed by the marts are rounded to this many decimals.
pub const AVG_DECIMALS: i32 = 2;

// === Catalogue ===

/// Movie title max length (chars).
pub const MAX_TITLE_LEN: usize = 300;

/// Genre max length (chars).
pub const MAX_GENRE_LEN: usize = 64;

/// IMDb identifier max length (chars).
pub const MAX_IMDB_ID_LEN: usize = 16;

// === Raw zone ===

/// Phase label max length (chars).
pub const MAX_PHASE_LABEL_LEN: usize = 64;

/// Placeholder for missing categorical values in the warehouse.
pub const UNKNOWN: &str = "UNKNOWN";

/// Round a rating to the stored precision.
pub fn round_rating(value: f64) -> f64 {
    (value * RATING_SCALE).round() / RATING_SCALE
}

/// Round an average to the mart precision.
pub fn round_avg(value: f64) -> f64 {
    let factor = 10f64.powi(AVG_DECIMALS);
    (value * factor).round() / factor
}

/// True when `value` lies within the accepted rating range.
pub fn rating_in_range(value: f64) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&value)
}
