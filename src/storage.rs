//! JSON artifacts on disk: raw scrape cache, run output and reports.
//!
//! Writes go to a sibling temp file that is renamed over the target, so a reader (or a crash)
//! only ever sees the previous document or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::job::JobRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        StorageError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Serializes `value` as pretty JSON and atomically replaces `path` with it.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::json(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let temp_path = temp_path_for(path);
    let mut file = File::create(&temp_path).map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| StorageError::io(path, e))?;
    debug!("Wrote {} bytes to {}", json.len(), path.display());
    Ok(())
}

/// Reads a JSON document, returning `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::json(path, e))
}

pub fn save_jobs(path: &Path, jobs: &[JobRecord]) -> Result<(), StorageError> {
    write_json(path, jobs)?;
    info!("Saved {} jobs to {}", jobs.len(), path.display());
    Ok(())
}

/// Loads the raw scrape cache; a missing cache is an empty one.
pub fn load_jobs(path: &Path) -> Result<Vec<JobRecord>, StorageError> {
    let jobs: Vec<JobRecord> = read_json(path)?.unwrap_or_default();
    info!("Loaded {} cached jobs from {}", jobs.len(), path.display());
    Ok(jobs)
}

/// `<dir>/<prefix>_YYYYmmdd_HHMMSS.json`
pub fn timestamped_path(dir: &Path, prefix: &str, at: NaiveDateTime) -> PathBuf {
    dir.join(format!("{}_{}.json", prefix, at.format("%Y%m%d_%H%M%S")))
}

/// Like [`timestamped_path`], but never names a file that already exists: a second save within
/// the same second gets `_1`, then `_2`, and so on.
pub fn fresh_path(dir: &Path, prefix: &str, at: NaiveDateTime) -> PathBuf {
    let first = timestamped_path(dir, prefix, at);
    if !first.exists() {
        return first;
    }
    let stamp = at.format("%Y%m%d_%H%M%S");
    (1..)
        .map(|n| dir.join(format!("{}_{}_{}.json", prefix, stamp, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
