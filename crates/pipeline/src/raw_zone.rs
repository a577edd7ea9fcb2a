//! Raw zone: one subdirectory per phase, each with the three CSVs.

use etl_core::{Error, Phase, RawFile, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved paths of a phase's raw files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseFiles {
    pub phase: Phase,
    pub movies: PathBuf,
    pub users: PathBuf,
    pub ratings: PathBuf,
}

impl PhaseFiles {
    pub fn path(&self, file: RawFile) -> &Path {
        match file {
            RawFile::Movies => &self.movies,
            RawFile::Users => &self.users,
            RawFile::Ratings => &self.ratings,
        }
    }
}

/// The raw-zone directory.
#[derive(Debug, Clone)]
pub struct RawZone {
    root: PathBuf,
}

impl RawZone {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase_dir(&self, phase: &Phase) -> PathBuf {
        self.root.join(phase.as_str())
    }

    /// Resolves a phase, requiring all three files to exist.
    ///
    /// Every missing file is named in the error.
    pub fn locate(&self, phase: &Phase) -> Result<PhaseFiles> {
        let dir = self.phase_dir(phase);
        if !dir.is_dir() {
            return Err(Error::input_missing(format!(
                "phase '{}' not found in raw zone {}",
                phase,
                self.root.display()
            )));
        }

        let missing: Vec<&str> = RawFile::ALL
            .iter()
            .filter(|f| !dir.join(f.file_name()).is_file())
            .map(|f| f.file_name())
            .collect();
        if !missing.is_empty() {
            return Err(Error::input_missing(format!(
                "phase '{}' is missing {}",
                phase,
                missing.join(", ")
            )));
        }

        debug!(phase = %phase, dir = %dir.display(), "Located raw files");
        Ok(PhaseFiles {
            phase: phase.clone(),
            movies: dir.join(RawFile::Movies.file_name()),
            users: dir.join(RawFile::Users.file_name()),
            ratings: dir.join(RawFile::Ratings.file_name()),
        })
    }

    /// Phase labels present in the raw zone, sorted.
    pub fn list_phases(&self) -> Result<Vec<String>> {
        let mut phases = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if Phase::new(name.as_str()).is_ok() {
                phases.push(name);
            }
        }
        phases.sort();
        Ok(phases)
    }

    /// True when the root directory exists.
    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }
}
