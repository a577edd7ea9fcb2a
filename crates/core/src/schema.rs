//! CSV contracts for the raw zone.
//!
//! Each raw file must carry exactly one of the accepted header layouts.
//! The reformulated layout renames columns but keeps their positions, so
//! records of both layouts parse into the same staging rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::staging::{StgMovie, StgRating, StgUser};

/// The three raw files of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawFile {
    Movies,
    Users,
    Ratings,
}

impl RawFile {
    /// All raw files, in load order.
    pub const ALL: [RawFile; 3] = [RawFile::Movies, RawFile::Users, RawFile::Ratings];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Movies => "movies.csv",
            Self::Users => "users.csv",
            Self::Ratings => "ratings.csv",
        }
    }

    /// Header columns the file must carry in the given layout.
    pub fn expected_headers(&self, layout: Layout) -> &'static [&'static str] {
        match (self, layout) {
            (Self::Movies, Layout::Canonical) => &["id", "title", "year", "genre", "imdb_id"],
            (Self::Movies, Layout::Reformulated) => {
                &["movie_id", "title", "release_year", "primary_genre", "imdb"]
            }
            (Self::Users, _) => &["id", "age_range", "country"],
            (Self::Ratings, Layout::Canonical) => &["user_id", "movie_id", "rating", "created_at"],
            (Self::Ratings, Layout::Reformulated) => &["uid", "mid", "score", "ts"],
        }
    }

    pub fn column_count(&self) -> usize {
        self.expected_headers(Layout::Canonical).len()
    }
}

/// Header layout of a raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `raw_v1` / `improved_v2` column names.
    Canonical,
    /// `reformulated_v3` column names.
    Reformulated,
}

/// Matches a header row against the accepted layouts.
///
/// Header cells are trimmed and a leading UTF-8 BOM is ignored; otherwise
/// names and order must match exactly.
pub fn detect_layout(file: RawFile, headers: &[String]) -> Result<Layout> {
    let found: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    for layout in [Layout::Canonical, Layout::Reformulated] {
        let expected = file.expected_headers(layout);
        if found.len() == expected.len() && found.iter().zip(expected).all(|(f, e)| f == e) {
            return Ok(layout);
        }
    }

    Err(Error::header_mismatch(
        file.file_name(),
        file.expected_headers(Layout::Canonical),
        &found,
    ))
}

/// Cursor over one record's fields with file/line context for errors.
struct Fields<'a> {
    file: RawFile,
    line: u64,
    values: &'a [&'a str],
}

impl<'a> Fields<'a> {
    fn new(file: RawFile, line: u64, values: &'a [&'a str]) -> Result<Self> {
        if values.len() != file.column_count() {
            return Err(Error::malformed_row(
                file.file_name(),
                line,
                format!(
                    "expected {} fields, found {}",
                    file.column_count(),
                    values.len()
                ),
            ));
        }
        Ok(Self { file, line, values })
    }

    fn column(&self, idx: usize) -> &'static str {
        self.file.expected_headers(Layout::Canonical)[idx]
    }

    fn malformed(&self, idx: usize, msg: impl Into<String>) -> Error {
        Error::malformed_row(
            self.file.file_name(),
            self.line,
            format!("column '{}': {}", self.column(idx), msg.into()),
        )
    }

    fn raw(&self, idx: usize) -> Option<&'a str> {
        let v = self.values[idx].trim();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    }

    fn int(&self, idx: usize) -> Result<i32> {
        self.opt_int(idx)?
            .ok_or_else(|| self.malformed(idx, "value is required"))
    }

    fn opt_int(&self, idx: usize) -> Result<Option<i32>> {
        match self.raw(idx) {
            None => Ok(None),
            Some(v) => parse_int(v)
                .map(Some)
                .ok_or_else(|| self.malformed(idx, format!("'{}' is not an integer", v))),
        }
    }

    fn opt_decimal(&self, idx: usize) -> Result<Option<f64>> {
        match self.raw(idx) {
            None => Ok(None),
            Some(v) => match v.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(self.malformed(idx, format!("'{}' is not a decimal", v))),
            },
        }
    }

    fn opt_text(&self, idx: usize) -> Option<String> {
        self.raw(idx).map(str::to_string)
    }

    fn opt_timestamp(&self, idx: usize) -> Result<Option<DateTime<Utc>>> {
        match self.raw(idx) {
            None => Ok(None),
            Some(v) => parse_timestamp(v)
                .map(Some)
                .ok_or_else(|| self.malformed(idx, format!("'{}' is not a timestamp", v))),
        }
    }
}

/// Integers may be written with a trailing `.0` by spreadsheet exports.
fn parse_int(v: &str) -> Option<i32> {
    v.parse::<i32>()
        .ok()
        .or_else(|| v.strip_suffix(".0").and_then(|s| s.parse::<i32>().ok()))
}

/// Parses the timestamp formats accepted in `created_at`.
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(v: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(v) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses a `movies.csv` record.
pub fn parse_movie(line: u64, values: &[&str]) -> Result<StgMovie> {
    let f = Fields::new(RawFile::Movies, line, values)?;
    Ok(StgMovie {
        source_line: line,
        id: f.int(0)?,
        title: f.opt_text(1),
        year: f.opt_int(2)?,
        genre: f.opt_text(3),
        imdb_id: f.opt_text(4),
    })
}

/// Parses a `users.csv` record.
pub fn parse_user(line: u64, values: &[&str]) -> Result<StgUser> {
    let f = Fields::new(RawFile::Users, line, values)?;
    Ok(StgUser {
        source_line: line,
        id: f.int(0)?,
        age_range: f.opt_text(1),
        country: f.opt_text(2),
    })
}

/// Parses a `ratings.csv` record.
pub fn parse_rating(line: u64, values: &[&str]) -> Result<StgRating> {
    let f = Fields::new(RawFile::Ratings, line, values)?;
    Ok(StgRating {
        source_line: line,
        user_id: f.int(0)?,
        movie_id: f.int(1)?,
        rating: f.opt_decimal(2)?,
        created_at: f.opt_timestamp(3)?,
    })
}
