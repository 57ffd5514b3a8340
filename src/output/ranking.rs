//! Per-genre popularity rankings

use crate::storage::{write_json_atomic, DataLayout, StorageResult, TrackStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// One line of a ranking file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTrack {
    pub rank: usize,
    pub track_id: String,
    pub track_name: String,
    pub artist_name: String,
    pub popularity: u32,
}

/// Builds the top `size` tracks of a genre from the database
pub fn top_tracks(store: &dyn TrackStore, genre: &str, size: usize) -> StorageResult<Vec<RankedTrack>> {
    Ok(store
        .top_tracks(genre, size)?
        .into_iter()
        .enumerate()
        .map(|(i, track)| RankedTrack {
            rank: i + 1,
            track_id: track.track_id,
            track_name: track.track_name,
            artist_name: track.artist_name,
            popularity: track.popularity,
        })
        .collect())
}

/// Writes `processed/top_tracks_<genre>_<timestamp>.json`
///
/// Returns None without writing when the genre has no tracks.
pub fn write_ranking(
    layout: &DataLayout,
    store: &dyn TrackStore,
    genre: &str,
    size: usize,
    at: DateTime<Utc>,
) -> StorageResult<Option<PathBuf>> {
    let ranking = top_tracks(store, genre, size)?;
    if ranking.is_empty() {
        return Ok(None);
    }

    let path = layout.ranking_path(genre, at);
    write_json_atomic(&path, &ranking)?;
    Ok(Some(path))
}
