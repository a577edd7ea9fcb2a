//! CSV extraction into a staging batch.
//!
//! All three files are parsed completely before the caller touches any
//! table, so a header mismatch or malformed row leaves staging intact.

use csv::{ReaderBuilder, StringRecord};
use etl_core::schema::{self, detect_layout, Layout};
use etl_core::{Error, RawFile, Result, StagingBatch};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::raw_zone::PhaseFiles;

/// Parses the three files of a phase.
pub fn extract(files: &PhaseFiles) -> Result<StagingBatch> {
    let movies = read_file(RawFile::Movies, files.path(RawFile::Movies), schema::parse_movie)?;
    let users = read_file(RawFile::Users, files.path(RawFile::Users), schema::parse_user)?;
    let ratings = read_file(
        RawFile::Ratings,
        files.path(RawFile::Ratings),
        schema::parse_rating,
    )?;

    let batch = StagingBatch {
        movies,
        users,
        ratings,
    };
    let counts = batch.counts();
    info!(
        phase = %files.phase,
        movies = counts.movies,
        users = counts.users,
        ratings = counts.ratings,
        "Extracted raw files"
    );
    Ok(batch)
}

fn open(file: RawFile, path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        Error::input_missing(format!("cannot read {}: {}", file.file_name(), e))
    })
}

/// Reads one file, parsing each record with `parse`.
///
/// A zero-byte file is an empty table. Otherwise the header must match
/// one of the accepted layouts.
pub fn read_file<T>(
    file: RawFile,
    path: &Path,
    parse: fn(u64, &[&str]) -> Result<T>,
) -> Result<Vec<T>> {
    let mut handle = open(file, path)?;
    let mut buf = Vec::new();
    handle.read_to_end(&mut buf).map_err(|e| {
        Error::input_missing(format!("cannot read {}: {}", file.file_name(), e))
    })?;
    read_bytes(file, &buf, parse)
}

/// Parses CSV content already in memory.
pub fn read_bytes<T>(
    file: RawFile,
    data: &[u8],
    parse: fn(u64, &[&str]) -> Result<T>,
) -> Result<Vec<T>> {
    if data.iter().all(u8::is_ascii_whitespace) {
        debug!(file = file.file_name(), "Empty raw file");
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        // Arity is checked per row with file/line context
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(file, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let layout = detect_layout(file, &headers)?;
    if layout == Layout::Reformulated {
        debug!(file = file.file_name(), "Mapping reformulated headers");
    }

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                let values: Vec<&str> = record.iter().collect();
                rows.push(parse(line, &values)?);
            }
            Err(e) => return Err(csv_error(file, e)),
        }
    }

    Ok(rows)
}

fn csv_error(file: RawFile, err: csv::Error) -> Error {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.kind() {
        csv::ErrorKind::Io(e) => {
            Error::input_missing(format!("cannot read {}: {}", file.file_name(), e))
        }
        _ => Error::malformed_row(file.file_name(), line, err.to_string()),
    }
}
