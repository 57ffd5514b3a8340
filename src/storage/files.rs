//! Partitioned JSON file layers
//!
//! Layout under the data directory:
//!
//! ```text
//! raw/<genre>/YYYY/MM/DD/<kind>_<id>_<timestamp>.json        write-once
//! processed/<genre>/YYYY/MM/DD/<genre>_<timestamp>.json     atomic replace
//! processed/top_tracks_<genre>_<timestamp>.json
//! checkpoints/checkpoint_<genre>.json
//! metrics/metrics_<timestamp>.{prom,json}
//! ```

use crate::catalog::ProcessedTrack;
use crate::storage::StorageResult;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Turns a genre name into a file-system friendly slug
///
/// Names that are already lowercase and safe are used as-is (`"hip-hop"`).
/// Anything else gets a short digest of the trimmed name appended, so
/// `"Bossa Nova"` and `"bossa_nova"` never share a file.
pub fn genre_slug(genre: &str) -> String {
    let name = genre.trim();
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    if !slug.is_empty() && slug == name {
        return slug;
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{}_{}", slug, &digest[..8])
}

/// File-name timestamp with millisecond precision
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Writes bytes through a temp file and a rename
///
/// Readers observe either the previous content or the new one.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Atomic JSON variant of [`write_bytes_atomic`]
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &bytes)
}

/// Writes JSON to a path that must not exist yet
///
/// Fails with `AlreadyExists` instead of touching an existing file.
pub fn write_json_new<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Paths of the data directory
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// `<base>/<genre>/YYYY/MM/DD`
    pub fn partition(base: &Path, genre: &str, date: DateTime<Utc>) -> PathBuf {
        base.join(genre_slug(genre))
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    }

    /// Stores one API response in the raw layer
    ///
    /// Raw files are never overwritten; two snapshots of the same entity in
    /// the same millisecond get a numeric suffix.
    pub fn write_raw(
        &self,
        genre: &str,
        kind: &str,
        id: &str,
        value: &serde_json::Value,
    ) -> StorageResult<PathBuf> {
        let now = Utc::now();
        let dir = Self::partition(&self.raw_dir(), genre, now);
        let stem = format!("{}_{}_{}", kind, genre_slug(id), file_timestamp(now));

        let mut path = dir.join(format!("{}.json", stem));
        let mut suffix = 1;
        loop {
            match write_json_new(&path, value) {
                Ok(()) => return Ok(path),
                Err(crate::storage::StorageError::Io(e))
                    if e.kind() == io::ErrorKind::AlreadyExists =>
                {
                    path = dir.join(format!("{}_{}.json", stem, suffix));
                    suffix += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Stores a genre's validated records in the processed layer
    pub fn write_processed(
        &self,
        genre: &str,
        records: &[ProcessedTrack],
        at: DateTime<Utc>,
    ) -> StorageResult<PathBuf> {
        let dir = Self::partition(&self.processed_dir(), genre, at);
        let path = dir.join(format!(
            "{}_{}.json",
            genre_slug(genre),
            file_timestamp(at)
        ));
        write_json_atomic(&path, records)?;
        Ok(path)
    }

    /// Path of a genre's popularity ranking
    pub fn ranking_path(&self, genre: &str, at: DateTime<Utc>) -> PathBuf {
        self.processed_dir().join(format!(
            "top_tracks_{}_{}.json",
            genre_slug(genre),
            file_timestamp(at)
        ))
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.root.join("metrics")
    }

    /// Path of a run's JSON metrics snapshot
    pub fn metrics_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.metrics_dir()
            .join(format!("metrics_{}.json", file_timestamp(at)))
    }

    /// Path of a run's Prometheus text exposition
    pub fn prometheus_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.metrics_dir()
            .join(format!("metrics_{}.prom", file_timestamp(at)))
    }
}
