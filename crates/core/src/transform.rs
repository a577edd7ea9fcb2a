//! Warehouse build: staging rows → constrained warehouse rows.
//!
//! Constraints enforced here:
//! - movie and user ids are unique (first row in file order wins)
//! - every rating lies within `[MIN_RATING, MAX_RATING]`, one decimal
//! - every rating references a warehouse movie and user
//!
//! What happens to a violating row is decided by [`ViolationPolicy`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::limits::{rating_in_range, round_rating, MAX_RATING, MIN_RATING, UNKNOWN};
use crate::schema::RawFile;
use crate::staging::StagingBatch;
use crate::warehouse::{DwMovie, DwRating, DwUser, WarehouseSnapshot};

static IMDB_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tt[0-9]+$").expect("invalid IMDb id pattern"));
static NON_DIGIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9]").expect("invalid digit pattern"));

/// What to do with a row that violates a warehouse constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Drop the row and record it in the run report.
    #[default]
    Skip,
    /// Clamp out-of-range ratings into range; skip every other violation.
    Clamp,
    /// Fail the run on the first violation, leaving the warehouse untouched.
    Abort,
}

impl ViolationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Clamp => "clamp",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for ViolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "clamp" => Ok(Self::Clamp),
            "abort" => Ok(Self::Abort),
            other => Err(Error::validation(format!(
                "unknown violation policy '{}' (expected skip, clamp or abort)",
                other
            ))),
        }
    }
}

/// Kind of constraint a staging row violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DuplicateMovie,
    DuplicateUser,
    MissingTitle,
    MissingRating,
    RatingOutOfRange,
    UnknownMovie,
    UnknownUser,
}

/// A staging row that did not make it into the warehouse as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub file: RawFile,
    pub source_line: u64,
    pub kind: ViolationKind,
    pub detail: String,
    /// True when the row was kept after clamping.
    #[serde(default)]
    pub clamped: bool,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} line {}: {}",
            self.file.file_name(),
            self.source_line,
            self.detail
        )
    }
}

/// Result of a warehouse build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarehouseBuild {
    pub snapshot: WarehouseSnapshot,
    pub rejections: Vec<Rejection>,
}

impl WarehouseBuild {
    /// Rows dropped from the warehouse.
    pub fn rejected(&self) -> usize {
        self.rejections.iter().filter(|r| !r.clamped).count()
    }

    /// Rows kept after clamping.
    pub fn clamped(&self) -> usize {
        self.rejections.iter().filter(|r| r.clamped).count()
    }
}

/// Normalizes an IMDb identifier to the `tt<digits>` form.
///
/// Ids with no digits at all normalize to `None`.
pub fn normalize_imdb_id(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if IMDB_ID_REGEX.is_match(raw) {
        return Some(raw.to_string());
    }
    let digits = NON_DIGIT_REGEX.replace_all(raw, "");
    if digits.is_empty() {
        None
    } else {
        Some(format!("tt{}", digits))
    }
}

fn or_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Applies the policy to one violation.
///
/// Returns `Ok(())` when the row is dropped and the build continues.
fn reject(
    policy: ViolationPolicy,
    rejections: &mut Vec<Rejection>,
    rejection: Rejection,
) -> Result<()> {
    if policy == ViolationPolicy::Abort {
        return Err(Error::constraint_violation(rejection.to_string()));
    }
    debug!(
        file = rejection.file.file_name(),
        line = rejection.source_line,
        kind = ?rejection.kind,
        "Row rejected"
    );
    rejections.push(rejection);
    Ok(())
}

/// Builds the warehouse from staging under the given policy.
///
/// Deterministic: the same staging contents always yield the same snapshot.
pub fn build_warehouse(staging: &StagingBatch, policy: ViolationPolicy) -> Result<WarehouseBuild> {
    let mut staging = staging.clone();
    staging.sort_by_line();

    let mut rejections = Vec::new();

    // Movies
    let mut movie_ids = HashSet::new();
    let mut movies = Vec::with_capacity(staging.movies.len());
    for row in &staging.movies {
        if movie_ids.contains(&row.id) {
            reject(
                policy,
                &mut rejections,
                Rejection {
                    file: RawFile::Movies,
                    source_line: row.source_line,
                    kind: ViolationKind::DuplicateMovie,
                    detail: format!("duplicate movie id {}", row.id),
                    clamped: false,
                },
            )?;
            continue;
        }

        let title = row.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            reject(
                policy,
                &mut rejections,
                Rejection {
                    file: RawFile::Movies,
                    source_line: row.source_line,
                    kind: ViolationKind::MissingTitle,
                    detail: format!("movie {} has no title", row.id),
                    clamped: false,
                },
            )?;
            continue;
        }

        movie_ids.insert(row.id);
        movies.push(DwMovie {
            id: row.id,
            title: title.to_string(),
            year: row.year,
            genre: or_unknown(row.genre.as_deref()),
            imdb_id: normalize_imdb_id(row.imdb_id.as_deref()),
        });
    }

    // Users
    let mut user_ids = HashSet::new();
    let mut users = Vec::with_capacity(staging.users.len());
    for row in &staging.users {
        if !user_ids.insert(row.id) {
            reject(
                policy,
                &mut rejections,
                Rejection {
                    file: RawFile::Users,
                    source_line: row.source_line,
                    kind: ViolationKind::DuplicateUser,
                    detail: format!("duplicate user id {}", row.id),
                    clamped: false,
                },
            )?;
            continue;
        }

        users.push(DwUser {
            id: row.id,
            age_range: or_unknown(row.age_range.as_deref()),
            country: or_unknown(row.country.as_deref()),
        });
    }

    // Ratings
    let mut ratings = Vec::with_capacity(staging.ratings.len());
    for row in &staging.ratings {
        let base = |kind, detail: String| Rejection {
            file: RawFile::Ratings,
            source_line: row.source_line,
            kind,
            detail,
            clamped: false,
        };

        if !movie_ids.contains(&row.movie_id) {
            reject(
                policy,
                &mut rejections,
                base(
                    ViolationKind::UnknownMovie,
                    format!("rating references unknown movie {}", row.movie_id),
                ),
            )?;
            continue;
        }
        if !user_ids.contains(&row.user_id) {
            reject(
                policy,
                &mut rejections,
                base(
                    ViolationKind::UnknownUser,
                    format!("rating references unknown user {}", row.user_id),
                ),
            )?;
            continue;
        }

        let Some(value) = row.rating else {
            reject(
                policy,
                &mut rejections,
                base(ViolationKind::MissingRating, "rating value is missing".into()),
            )?;
            continue;
        };

        let mut value = round_rating(value);
        if !rating_in_range(value) {
            let detail = format!(
                "rating {} out of range [{}, {}]",
                value, MIN_RATING, MAX_RATING
            );
            match policy {
                ViolationPolicy::Clamp => {
                    value = value.clamp(MIN_RATING, MAX_RATING);
                    rejections.push(Rejection {
                        clamped: true,
                        ..base(ViolationKind::RatingOutOfRange, detail)
                    });
                }
                _ => {
                    reject(
                        policy,
                        &mut rejections,
                        base(ViolationKind::RatingOutOfRange, detail),
                    )?;
                    continue;
                }
            }
        }

        ratings.push(DwRating {
            id: ratings.len() as u64 + 1,
            user_id: row.user_id,
            movie_id: row.movie_id,
            rating: value,
            created_at: row.created_at,
        });
    }

    let mut snapshot = WarehouseSnapshot {
        movies,
        users,
        ratings,
    };
    snapshot.sort_by_key();

    if !rejections.is_empty() {
        warn!(
            policy = %policy,
            rejected = rejections.iter().filter(|r| !r.clamped).count(),
            clamped = rejections.iter().filter(|r| r.clamped).count(),
            "Warehouse build dropped or adjusted rows"
        );
    }

    Ok(WarehouseBuild {
        snapshot,
        rejections,
    })
}
