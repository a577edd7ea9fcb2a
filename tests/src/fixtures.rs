//! Raw-zone datasets and request bodies.

use std::fs;
use std::path::Path;

pub const MOVIES_HEADER: &str = "id,title,year,genre,imdb_id";
pub const USERS_HEADER: &str = "id,age_range,country";
pub const RATINGS_HEADER: &str = "user_id,movie_id,rating,created_at";

/// The three CSVs of one phase.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub movies: String,
    pub users: String,
    pub ratings: String,
}

impl Dataset {
    /// Builds a canonical-layout dataset from data rows.
    pub fn canonical(movies: &[&str], users: &[&str], ratings: &[&str]) -> Self {
        Self {
            movies: csv(MOVIES_HEADER, movies),
            users: csv(USERS_HEADER, users),
            ratings: csv(RATINGS_HEADER, ratings),
        }
    }

    /// Small catalogue with one out-of-range rating and one unknown age.
    ///
    /// After a skip-policy run:
    /// - top by genre: Crime/Heat 10.0, Drama/The Godfather 7.0, Horror/Alien 9.0
    /// - by age: 26-35 10.0 (1), UNKNOWN 9.0 (1), 18-25 7.0 (2)
    /// - by country: BR 3, US 1
    pub fn sample() -> Self {
        Self::canonical(
            &[
                "1,The Godfather,1972,Drama,tt0068646",
                "2,Heat,1995,Crime,113277",
                "3,Alien,1979,Horror,",
                "4,Untitled,,Drama,",
            ],
            &["1,18-25,BR", "2,18-25,BR", "3,26-35,BR", "4,,US"],
            &[
                "1,1,8,2024-03-01 10:00:00",
                "2,1,6,2024-03-01 11:00:00",
                "3,2,10,2024-03-02 09:30:00",
                "4,3,9,2024-03-03",
                "1,2,11,2024-03-04",
            ],
        )
    }

    /// Same catalogue with the reformulated headers.
    pub fn sample_reformulated() -> Self {
        let sample = Self::sample();
        Self {
            movies: sample.movies.replacen(
                MOVIES_HEADER,
                "movie_id,title,release_year,primary_genre,imdb",
                1,
            ),
            users: sample.users,
            ratings: sample.ratings.replacen(RATINGS_HEADER, "uid,mid,score,ts", 1),
        }
    }

    /// Sample catalogue without any ratings.
    pub fn without_ratings() -> Self {
        Self {
            ratings: csv(RATINGS_HEADER, &[]),
            ..Self::sample()
        }
    }

    /// Writes the dataset as `<raw_dir>/<phase>/{movies,users,ratings}.csv`.
    pub fn write(&self, raw_dir: &Path, phase: &str) {
        let dir = raw_dir.join(phase);
        fs::create_dir_all(&dir).expect("Failed to create phase directory");
        fs::write(dir.join("movies.csv"), &self.movies).expect("Failed to write movies.csv");
        fs::write(dir.join("users.csv"), &self.users).expect("Failed to write users.csv");
        fs::write(dir.join("ratings.csv"), &self.ratings).expect("Failed to write ratings.csv");
    }
}

fn csv(header: &str, rows: &[&str]) -> String {
    let mut out = String::from(header);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

/// Movie create/update body.
pub fn movie_body(title: &str, year: Option<i32>, genre: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "year": year,
        "genre": genre,
    })
}

/// Rating create body.
pub fn rating_body(movie_id: u64, user_id: Option<u64>, rating: f64) -> serde_json::Value {
    serde_json::json!({
        "movieId": movie_id,
        "userId": user_id,
        "rating": rating,
    })
}
