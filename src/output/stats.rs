//! Statistics generation from the track database and checkpoints
//!
//! This module provides functionality for extracting and displaying
//! collection statistics from the storage layer.

use crate::state::GenreStatus;
use crate::storage::{CheckpointStore, RunRecord, TrackStore};
use crate::Result;
use std::collections::HashMap;

/// Collection statistics summary
#[derive(Debug, Clone)]
pub struct CollectionStatistics {
    /// Total number of tracks in the database
    pub total_tracks: u64,

    /// Number of distinct artists with at least one track
    pub unique_artists: u64,

    /// Track count per genre, sorted by genre
    pub tracks_by_genre: Vec<(String, u64)>,

    /// Number of checkpoints per status
    pub genres_by_status: HashMap<GenreStatus, u64>,

    /// Genres whose last run failed
    pub failed_genres: Vec<String>,

    /// Most recent invocation, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The track database to query
/// * `checkpoints` - The checkpoint store holding per-genre outcomes
///
/// # Returns
///
/// * `Ok(CollectionStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn TrackStore,
    checkpoints: &dyn CheckpointStore,
) -> Result<CollectionStatistics> {
    let total_tracks = storage.count_tracks()?;
    let unique_artists = storage.count_artists()?;
    let tracks_by_genre = storage.count_tracks_by_genre()?;
    let latest_run = storage.get_latest_run()?;

    let mut genres_by_status = HashMap::new();
    let mut failed_genres = Vec::new();
    for checkpoint in checkpoints.list_checkpoints()? {
        *genres_by_status.entry(checkpoint.status).or_insert(0) += 1;
        if checkpoint.status.is_error() {
            failed_genres.push(checkpoint.genre);
        }
    }

    Ok(CollectionStatistics {
        total_tracks,
        unique_artists,
        tracks_by_genre,
        genres_by_status,
        failed_genres,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CollectionStatistics) {
    println!("=== Collection Statistics ===\n");

    println!("Overview:");
    println!("  Total tracks: {}", stats.total_tracks);
    println!("  Unique artists: {}", stats.unique_artists);
    println!("  Genres with tracks: {}", stats.tracks_by_genre.len());
    println!();

    if !stats.tracks_by_genre.is_empty() {
        println!("Tracks by Genre:");
        // Sort genres by count (descending)
        let mut genre_counts: Vec<_> = stats.tracks_by_genre.iter().collect();
        genre_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (genre, count) in genre_counts {
            let percentage = if stats.total_tracks > 0 {
                (*count as f64 / stats.total_tracks as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", genre, count, percentage);
        }
        println!();
    }

    let total_checkpoints: u64 = stats.genres_by_status.values().sum();
    if total_checkpoints > 0 {
        println!("Genres by Status:");
        for status in GenreStatus::all() {
            if let Some(count) = stats.genres_by_status.get(&status) {
                println!("  {}: {}", status, count);
            }
        }
        println!();
    }

    if !stats.failed_genres.is_empty() {
        println!("Failed Genres ({}):", stats.failed_genres.len());
        for genre in &stats.failed_genres {
            println!("  - {}", genre);
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  #{} ({}) {}", run.id, run.mode, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Genres: {}, tracks: {}, errors: {}",
            run.genres_processed, run.tracks_loaded, run.errors
        );
        println!();
    }

    // Calculate completion rate
    let settled: u64 = stats
        .genres_by_status
        .iter()
        .filter(|(status, _)| status.is_settled())
        .map(|(_, count)| *count)
        .sum();
    let completion_rate = if total_checkpoints > 0 {
        (settled as f64 / total_checkpoints as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Completion Rate: {:.1}% ({} / {} genres settled)",
        completion_rate, settled, total_checkpoints
    );
}
