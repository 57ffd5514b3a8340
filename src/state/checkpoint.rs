use crate::state::GenreStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted record of a genre's last processing outcome
///
/// One of these lives in `checkpoints/checkpoint_<genre>.json`. It is
/// rewritten only after the processed output of a run is durably stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreCheckpoint {
    /// Filled in from the file name when an older record lacks it
    #[serde(default)]
    pub genre: String,

    #[serde(default)]
    pub status: GenreStatus,

    /// When the last run for this genre finished
    #[serde(default)]
    pub last_run_timestamp: Option<DateTime<Utc>>,

    /// Artists whose tracks have been loaded, across runs
    #[serde(default)]
    pub artist_count: usize,

    /// Tracks loaded by the last run
    #[serde(default)]
    pub track_count: usize,

    /// Artist-level failures in the last run
    #[serde(default)]
    pub error_count: usize,

    /// Discovery strategy that produced the artists of the last run
    #[serde(default)]
    pub strategy: Option<String>,

    /// Ids of artists already loaded; skipped when a failed genre is resumed
    #[serde(default)]
    pub processed_artists: Vec<String>,
}

impl GenreCheckpoint {
    /// Creates a pending checkpoint for a genre seen for the first time
    pub fn new(genre: &str) -> Self {
        Self {
            genre: genre.to_string(),
            status: GenreStatus::Pending,
            last_run_timestamp: None,
            artist_count: 0,
            track_count: 0,
            error_count: 0,
            strategy: None,
            processed_artists: Vec::new(),
        }
    }

    pub fn has_processed(&self, artist_id: &str) -> bool {
        self.processed_artists.iter().any(|id| id == artist_id)
    }

    /// Adds freshly loaded artists, keeping the list free of duplicates
    pub fn record_artists<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        for id in ids {
            if !self.has_processed(&id) {
                self.processed_artists.push(id);
            }
        }
        self.artist_count = self.processed_artists.len();
    }

    /// Records the outcome of a run
    pub fn finish(&mut self, status: GenreStatus, tracks: usize, errors: usize) {
        self.status = status;
        self.track_count = tracks;
        self.error_count = errors;
        self.last_run_timestamp = Some(Utc::now());
    }

    /// Records that discovery produced no artist at all
    pub fn mark_empty(&mut self) {
        self.strategy = None;
        self.finish(GenreStatus::Empty, 0, 0);
    }
}
