//! Storage module for persisting collected data
//!
//! This module handles everything the collector writes to disk:
//! - SQLite database initialization and schema management
//! - Track upserts and run tracking
//! - The partitioned raw and processed JSON layers
//! - Per-genre checkpoints and the rotation file

mod checkpoints;
mod files;
mod loader;
mod schema;
mod sqlite;
mod traits;

pub use checkpoints::JsonCheckpointStore;
pub use files::{genre_slug, write_bytes_atomic, write_json_atomic, write_json_new, DataLayout};
pub use loader::{LoadOutput, Loader};
pub use sqlite::SqliteStorage;
pub use traits::{CheckpointStore, StorageError, StorageResult, TrackStore};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Outcome of an upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadResult {
    /// Track ids that were not in the database before
    pub inserted: usize,

    /// Track ids whose existing row was replaced
    pub updated: usize,
}

impl LoadResult {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Counters recorded when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub genres_processed: u64,
    pub tracks_loaded: u64,
    pub errors: u64,
}

/// Represents one invocation of the collector
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub genres_processed: u64,
    pub tracks_loaded: u64,
    pub errors: u64,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but at least one genre failed
    Partial,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
