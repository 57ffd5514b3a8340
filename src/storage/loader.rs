//! Loads validated records into the processed layer and the database

use crate::catalog::ProcessedTrack;
use crate::output::{Counter, MetricsSink};
use crate::storage::files::DataLayout;
use crate::storage::traits::{StorageResult, TrackStore};
use crate::storage::LoadResult;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

/// What a load wrote
#[derive(Debug, Clone)]
pub struct LoadOutput {
    pub result: LoadResult,

    /// Processed-layer file, None when there was nothing to load
    pub path: Option<PathBuf>,
}

/// Writes the processed file, then upserts the database
///
/// Callers commit a checkpoint only after `load` returns Ok, so a genre is
/// never marked done for records that are not durably stored.
pub struct Loader<'a> {
    layout: &'a DataLayout,
    store: &'a mut dyn TrackStore,
    metrics: &'a dyn MetricsSink,
}

impl<'a> Loader<'a> {
    pub fn new(
        layout: &'a DataLayout,
        store: &'a mut dyn TrackStore,
        metrics: &'a dyn MetricsSink,
    ) -> Self {
        Self {
            layout,
            store,
            metrics,
        }
    }

    pub fn load(
        &mut self,
        genre: &str,
        records: &[ProcessedTrack],
        at: DateTime<Utc>,
    ) -> StorageResult<LoadOutput> {
        if records.is_empty() {
            return Ok(LoadOutput {
                result: LoadResult::default(),
                path: None,
            });
        }

        let path = self.layout.write_processed(genre, records, at)?;
        let result = self.store.upsert_tracks(records)?;

        self.metrics.incr(Counter::TracksInserted, result.inserted as u64);
        self.metrics.incr(Counter::TracksUpdated, result.updated as u64);

        info!(
            genre = %genre,
            inserted = result.inserted,
            updated = result.updated,
            path = %path.display(),
            "Loaded processed records"
        );

        Ok(LoadOutput {
            result,
            path: Some(path),
        })
    }
}
