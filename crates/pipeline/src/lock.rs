//! One run at a time per pipeline name.
//!
//! Two levels: an in-process set of active names, and a lock file
//! `<dir>/<name>.lock` created exclusively so concurrent CLI processes
//! see each other. A lock file past its expiry is taken over by renaming a
//! fresh file onto it, with a `<name>.lock.takeover` marker so only one
//! process replaces a given stale file. Guards only delete a lock file that
//! still names them as holder, and refresh the expiry while work goes on.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use etl_core::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// A takeover marker older than this is treated as abandoned.
pub const TAKEOVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Contents of a lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder_id: String,
    pub pid: u32,
    pub operation: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Lock registry for pipeline runs.
#[derive(Debug, Clone)]
pub struct RunLock {
    dir: PathBuf,
    ttl: Duration,
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunLock {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", name))
    }

    fn takeover_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.lock.takeover", name))
    }

    /// True while a guard for `name` is alive in this process.
    pub fn is_held(&self, name: &str) -> bool {
        self.active.lock().contains(name)
    }

    /// Acquires the lock for `name`, failing fast with `ETL_005` if held.
    pub fn acquire(&self, name: &str, operation: &str) -> Result<RunGuard> {
        if !self.active.lock().insert(name.to_string()) {
            return Err(Error::run_in_progress(name));
        }

        match self.acquire_file(name, operation) {
            Ok((path, info)) => Ok(RunGuard {
                name: name.to_string(),
                path,
                holder_id: info.holder_id,
                ttl: self.ttl,
                active: self.active.clone(),
            }),
            Err(e) => {
                self.active.lock().remove(name);
                Err(e)
            }
        }
    }

    fn acquire_file(&self, name: &str, operation: &str) -> Result<(PathBuf, LockInfo)> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);

        let now = Utc::now();
        let info = LockInfo {
            holder_id: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            operation: operation.to_string(),
            acquired_at: now,
            expires_at: now + chrono_ttl(self.ttl),
        };

        if create_exclusive(&path, &info)? {
            debug!(lock = %path.display(), holder = %info.holder_id, "Run lock acquired");
            return Ok((path, info));
        }

        match read_info(&path) {
            Some(existing) if !existing.is_expired() => Err(Error::run_in_progress(name)),
            existing => {
                let stale = existing.map(|i| i.holder_id);
                self.take_over(name, &path, &info, stale.as_deref())?;
                Ok((path, info))
            }
        }
    }

    /// Replaces the stale lock file holding `stale`, or fails with `ETL_005`.
    fn take_over(
        &self,
        name: &str,
        path: &Path,
        info: &LockInfo,
        stale: Option<&str>,
    ) -> Result<()> {
        let marker = self.takeover_path(name);
        if !create_exclusive(&marker, info)? {
            if marker_abandoned(&marker) {
                warn!(marker = %marker.display(), "Removing abandoned lock takeover marker");
                remove_if_present(&marker)?;
            }
            return Err(Error::run_in_progress(name));
        }

        let result = (|| {
            // Another process may have replaced the stale file before the marker was ours
            let current = read_info(path);
            let unchanged = match &current {
                Some(current) => current.is_expired() && Some(current.holder_id.as_str()) == stale,
                None => stale.is_none(),
            };
            if !unchanged {
                return Err(Error::run_in_progress(name));
            }

            warn!(
                lock = %path.display(),
                holder = stale.unwrap_or("unknown"),
                "Taking over stale run lock"
            );
            replace(path, info)?;
            match read_info(path) {
                Some(written) if written.holder_id == info.holder_id => Ok(()),
                _ => Err(Error::run_in_progress(name)),
            }
        })();

        remove_if_present(&marker)?;
        result
    }
}

fn chrono_ttl(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::hours(1))
}

/// Writes the lock file if it does not exist yet.
fn create_exclusive(path: &Path, info: &LockInfo) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(&serde_json::to_vec(info)?)?;
    file.sync_all()?;
    Ok(true)
}

/// Atomically swaps `info` in at `path` through a holder-specific temp file.
fn replace(path: &Path, info: &LockInfo) -> Result<()> {
    let tmp = path.with_extension(format!("lock.{}.tmp", info.holder_id));
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&serde_json::to_vec(info)?)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn marker_abandoned(marker: &Path) -> bool {
    fs::metadata(marker)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > TAKEOVER_TIMEOUT)
}

/// Unreadable or corrupt lock files count as stale.
fn read_info(path: &Path) -> Option<LockInfo> {
    let data = fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct RunGuard {
    name: String,
    path: PathBuf,
    holder_id: String,
    ttl: Duration,
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// True while the lock file still names this guard as holder.
    pub fn owns_file(&self) -> bool {
        read_info(&self.path).is_some_and(|i| i.holder_id == self.holder_id)
    }

    /// Pushes the expiry one TTL past now. Fails with `ETL_005` once the
    /// file has been taken over by another holder.
    pub fn refresh(&self) -> Result<()> {
        let mut info = match read_info(&self.path) {
            Some(info) if info.holder_id == self.holder_id => info,
            _ => return Err(Error::run_in_progress(&self.name)),
        };
        info.expires_at = Utc::now() + chrono_ttl(self.ttl);
        replace(&self.path, &info)?;
        debug!(pipeline = %self.name, expires_at = %info.expires_at, "Run lock refreshed");
        Ok(())
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        match read_info(&self.path) {
            Some(info) if info.holder_id == self.holder_id => {
                if let Err(e) = remove_if_present(&self.path) {
                    warn!(lock = %self.path.display(), error = %e, "Failed to remove run lock");
                }
            }
            Some(info) => warn!(
                lock = %self.path.display(),
                holder = %info.holder_id,
                "Run lock was taken over while held, leaving it in place"
            ),
            None => {}
        }
        self.active.lock().remove(&self.name);
        debug!(pipeline = %self.name, "Run lock released");
    }
}
