//! Mart rows and their reference computation over a warehouse snapshot.
//!
//! The ClickHouse views and the in-memory store both follow these rules:
//! averages are rounded before ranking, groups without ratings are absent,
//! and ties always fall back to a text column so the order is total.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::limits::{round_avg, TOP_N_PER_GENRE};
use crate::warehouse::WarehouseSnapshot;

/// Row of the top-movies-per-genre mart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopByGenreRow {
    pub genre: String,
    pub movie_id: i32,
    pub title: String,
    pub avg_rating: f64,
    pub n_ratings: u64,
}

/// Row of the average-rating-by-age-range mart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvgByAgeRow {
    pub age_range: String,
    pub avg_rating: f64,
    pub n: u64,
}

/// Row of the ratings-by-country mart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingsByCountryRow {
    pub country: String,
    pub n: u64,
}

#[derive(Default)]
struct Acc {
    sum: f64,
    n: u64,
}

impl Acc {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.n += 1;
    }

    fn avg(&self) -> f64 {
        round_avg(self.sum / self.n as f64)
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Best movies of each genre, at most [`TOP_N_PER_GENRE`] per genre.
pub fn top_by_genre(snapshot: &WarehouseSnapshot) -> Vec<TopByGenreRow> {
    let movies: HashMap<i32, _> = snapshot.movies.iter().map(|m| (m.id, m)).collect();

    let mut per_movie: HashMap<i32, Acc> = HashMap::new();
    for rating in &snapshot.ratings {
        if movies.contains_key(&rating.movie_id) {
            per_movie.entry(rating.movie_id).or_default().add(rating.rating);
        }
    }

    let mut rows: Vec<TopByGenreRow> = per_movie
        .into_iter()
        .filter_map(|(movie_id, acc)| {
            let movie = movies.get(&movie_id)?;
            Some(TopByGenreRow {
                genre: movie.genre.clone(),
                movie_id,
                title: movie.title.clone(),
                avg_rating: acc.avg(),
                n_ratings: acc.n,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.genre
            .cmp(&b.genre)
            .then_with(|| desc(a.avg_rating, b.avg_rating))
            .then_with(|| b.n_ratings.cmp(&a.n_ratings))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });

    let mut kept = Vec::with_capacity(rows.len());
    let mut rank = 0;
    let mut current: Option<String> = None;
    for row in rows {
        if current.as_deref() != Some(row.genre.as_str()) {
            current = Some(row.genre.clone());
            rank = 0;
        }
        rank += 1;
        if rank <= TOP_N_PER_GENRE {
            kept.push(row);
        }
    }
    kept
}

/// Mean rating per user age range.
pub fn avg_by_age(snapshot: &WarehouseSnapshot) -> Vec<AvgByAgeRow> {
    let users: HashMap<i32, &str> = snapshot
        .users
        .iter()
        .map(|u| (u.id, u.age_range.as_str()))
        .collect();

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for rating in &snapshot.ratings {
        if let Some(age_range) = users.get(&rating.user_id) {
            groups.entry(*age_range).or_default().add(rating.rating);
        }
    }

    let mut rows: Vec<AvgByAgeRow> = groups
        .into_iter()
        .map(|(age_range, acc)| AvgByAgeRow {
            age_range: age_range.to_string(),
            avg_rating: acc.avg(),
            n: acc.n,
        })
        .collect();

    rows.sort_by(|a, b| {
        desc(a.avg_rating, b.avg_rating).then_with(|| a.age_range.cmp(&b.age_range))
    });
    rows
}

/// Number of ratings per user country.
pub fn ratings_by_country(snapshot: &WarehouseSnapshot) -> Vec<RatingsByCountryRow> {
    let users: HashMap<i32, &str> = snapshot
        .users
        .iter()
        .map(|u| (u.id, u.country.as_str()))
        .collect();

    let mut groups: HashMap<&str, u64> = HashMap::new();
    for rating in &snapshot.ratings {
        if let Some(country) = users.get(&rating.user_id) {
            *groups.entry(*country).or_default() += 1;
        }
    }

    let mut rows: Vec<RatingsByCountryRow> = groups
        .into_iter()
        .map(|(country, n)| RatingsByCountryRow {
            country: country.to_string(),
            n,
        })
        .collect();

    rows.sort_by(|a, b| b.n.cmp(&a.n).then_with(|| a.country.cmp(&b.country)));
    rows
}
