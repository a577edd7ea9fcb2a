//! Normalized CSV export of the warehouse and marts.

use csv::WriterBuilder;
use etl_core::{AvgByAgeRow, RatingsByCountryRow, Result, TopByGenreRow, WarehouseSnapshot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use telemetry::metrics;
use tracing::info;

pub const DW_MOVIES_FILE: &str = "dw_movies.csv";
pub const DW_USERS_FILE: &str = "dw_users.csv";
pub const DW_RATINGS_FILE: &str = "dw_ratings.csv";
pub const MARTS_DIR: &str = "marts";
pub const TOP_BY_GENRE_FILE: &str = "top10_by_genre.csv";
pub const AVG_BY_AGE_FILE: &str = "avg_by_age_range.csv";
pub const BY_COUNTRY_FILE: &str = "ratings_by_country.csv";

/// Everything an export writes.
#[derive(Debug, Clone, Default)]
pub struct ExportData {
    pub snapshot: WarehouseSnapshot,
    pub top_by_genre: Vec<TopByGenreRow>,
    pub avg_by_age: Vec<AvgByAgeRow>,
    pub ratings_by_country: Vec<RatingsByCountryRow>,
}

/// One written file, relative to the export directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFile {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub files: Vec<ExportedFile>,
}

impl ExportSummary {
    pub fn rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

/// Writes CSVs under the normalized-output directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes all six files. Each file is written to a temporary name and
    /// renamed into place.
    pub fn write(&self, data: &ExportData) -> Result<ExportSummary> {
        let start = Instant::now();
        fs::create_dir_all(self.dir.join(MARTS_DIR))?;

        let snapshot = &data.snapshot;
        let mut files = Vec::with_capacity(6);

        files.push(self.write_csv(
            DW_MOVIES_FILE,
            &["id", "title", "year", "genre", "imdb_id"],
            snapshot.movies.iter().map(|m| {
                vec![
                    m.id.to_string(),
                    m.title.clone(),
                    opt(m.year),
                    m.genre.clone(),
                    m.imdb_id.clone().unwrap_or_default(),
                ]
            }),
        )?);

        files.push(self.write_csv(
            DW_USERS_FILE,
            &["id", "age_range", "country"],
            snapshot
                .users
                .iter()
                .map(|u| vec![u.id.to_string(), u.age_range.clone(), u.country.clone()]),
        )?);

        files.push(self.write_csv(
            DW_RATINGS_FILE,
            &["id", "user_id", "movie_id", "rating", "created_at"],
            snapshot.ratings.iter().map(|r| {
                vec![
                    r.id.to_string(),
                    r.user_id.to_string(),
                    r.movie_id.to_string(),
                    format!("{:.1}", r.rating),
                    r.created_at
                        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_default(),
                ]
            }),
        )?);

        files.push(self.write_csv(
            &mart_file(TOP_BY_GENRE_FILE),
            &["genre", "movie_id", "title", "avg_rating", "n_ratings"],
            data.top_by_genre.iter().map(|r| {
                vec![
                    r.genre.clone(),
                    r.movie_id.to_string(),
                    r.title.clone(),
                    format!("{:.2}", r.avg_rating),
                    r.n_ratings.to_string(),
                ]
            }),
        )?);

        files.push(self.write_csv(
            &mart_file(AVG_BY_AGE_FILE),
            &["age_range", "avg_rating", "n"],
            data.avg_by_age.iter().map(|r| {
                vec![
                    r.age_range.clone(),
                    format!("{:.2}", r.avg_rating),
                    r.n.to_string(),
                ]
            }),
        )?);

        files.push(self.write_csv(
            &mart_file(BY_COUNTRY_FILE),
            &["country", "n"],
            data.ratings_by_country
                .iter()
                .map(|r| vec![r.country.clone(), r.n.to_string()]),
        )?);

        let summary = ExportSummary {
            dir: self.dir.clone(),
            files,
        };

        let m = metrics();
        m.exports_written.inc();
        m.export_rows.inc_by(summary.rows() as u64);
        m.export_latency_ms.observe(start.elapsed().as_millis() as u64);

        info!(
            dir = %self.dir.display(),
            rows = summary.rows(),
            "Export written"
        );
        Ok(summary)
    }

    fn write_csv<I>(&self, name: &str, header: &[&str], rows: I) -> Result<ExportedFile>
    where
        I: Iterator<Item = Vec<String>>,
    {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(&tmp)
            .map_err(io::Error::from)?;
        writer.write_record(header).map_err(io::Error::from)?;
        let mut count = 0;
        for row in rows {
            writer.write_record(&row).map_err(io::Error::from)?;
            count += 1;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp, &target)?;
        Ok(ExportedFile {
            name: name.to_string(),
            rows: count,
        })
    }
}

fn mart_file(name: &str) -> String {
    format!("{}/{}", MARTS_DIR, name)
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}
