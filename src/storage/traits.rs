//! Storage traits and error types
//!
//! This module defines the trait interface for the track database and the
//! checkpoint store, plus the associated error type.

use crate::catalog::ProcessedTrack;
use crate::state::{GenreCheckpoint, RotationState};
use crate::storage::{LoadResult, RunRecord, RunStatus, RunSummary};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the local track database
///
/// The database is single-writer; implementations need not coordinate
/// concurrent processes.
pub trait TrackStore {
    // ===== Tracks =====

    /// Inserts or replaces tracks keyed by external track id
    ///
    /// All rows are written in one transaction; the result tells how many
    /// ids were new and how many replaced an existing row.
    fn upsert_tracks(&mut self, tracks: &[ProcessedTrack]) -> StorageResult<LoadResult>;

    /// Gets a track by its external id
    fn get_track(&self, track_id: &str) -> StorageResult<Option<ProcessedTrack>>;

    /// Gets the most popular tracks of a genre, most popular first
    fn top_tracks(&self, genre: &str, limit: usize) -> StorageResult<Vec<ProcessedTrack>>;

    // ===== Statistics =====

    /// Gets total track count
    fn count_tracks(&self) -> StorageResult<u64>;

    /// Gets count of distinct artists
    fn count_artists(&self) -> StorageResult<u64>;

    /// Gets track counts per genre, sorted by genre
    fn count_tracks_by_genre(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Run Management =====

    /// Records the start of an invocation
    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of an invocation with its totals
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}

/// Trait for per-genre checkpoints and the rotation file
///
/// Implementations must make every save atomic: a reader sees either the
/// previous record or the new one, never a torn write.
pub trait CheckpointStore {
    /// Loads the checkpoint of a genre, None if it was never recorded
    fn load_checkpoint(&self, genre: &str) -> StorageResult<Option<GenreCheckpoint>>;

    /// Replaces the checkpoint of a genre
    fn save_checkpoint(&self, checkpoint: &GenreCheckpoint) -> StorageResult<()>;

    /// Moves a genre's checkpoint aside so the next run starts over
    ///
    /// Returns true if there was a checkpoint to move.
    fn reset_checkpoint(&self, genre: &str) -> StorageResult<bool>;

    /// Loads every recorded checkpoint, sorted by genre
    fn list_checkpoints(&self) -> StorageResult<Vec<GenreCheckpoint>>;

    /// Loads the rotation state, None if the file does not exist yet
    fn load_rotation(&self) -> StorageResult<Option<RotationState>>;

    /// Replaces the rotation state
    fn save_rotation(&self, state: &RotationState) -> StorageResult<()>;
}
