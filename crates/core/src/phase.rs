//! Raw-zone phase labels.
//!
//! A phase selects one snapshot subdirectory of the raw zone. The three
//! historical snapshots are named below, but any label made of
//! `[A-Za-z0-9_.-]` is accepted so new snapshots can be dropped in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::limits::MAX_PHASE_LABEL_LEN;

/// Original raw export.
pub const RAW_V1: &str = "raw_v1";
/// Cleaned-up export with the same layout.
pub const IMPROVED_V2: &str = "improved_v2";
/// Export with renamed movie and rating columns.
pub const REFORMULATED_V3: &str = "reformulated_v3";

/// Phase used when none is given.
pub const DEFAULT_PHASE: &str = RAW_V1;

/// Validated phase label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phase(String);

impl Phase {
    /// Validates and wraps a phase label.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();

        if label.is_empty() {
            return Err(Error::input_missing("phase label is empty"));
        }
        if label.len() > MAX_PHASE_LABEL_LEN {
            return Err(Error::input_missing(format!(
                "phase label exceeds {} chars",
                MAX_PHASE_LABEL_LEN
            )));
        }
        // Rejects path separators and parent references
        if label == "." || label == ".." || label.starts_with('.') {
            return Err(Error::input_missing(format!("invalid phase label '{}'", label)));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(Error::input_missing(format!("invalid phase label '{}'", label)));
        }

        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the snapshots shipped with the project.
    pub fn is_known(&self) -> bool {
        matches!(self.0.as_str(), RAW_V1 | IMPROVED_V2 | REFORMULATED_V3)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self(DEFAULT_PHASE.to_string())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Phase {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.0
    }
}
