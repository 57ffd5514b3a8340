//! Genre scheduling for batch runs
//!
//! This module handles:
//! - Building the genre list when no rotation exists yet
//! - Picking the genres of a batch from the rotation cursor
//! - Computing the cursor to persist once the batch is over

use crate::collector::traits::CatalogApi;
use crate::state::RotationState;
use crate::storage::CheckpointStore;
use crate::{HarvestError, Result};
use std::collections::HashSet;
use tracing::{info, warn};

/// Used when neither the configuration nor the API provide genres
///
/// Includes genres known to give direct search trouble (`gospel`,
/// `hip-hop`, `forro`, `pagode`), which exercise the playlist fallback.
pub const FALLBACK_GENRES: &[&str] = &[
    "rock",
    "pop",
    "hiphop",
    "hip-hop",
    "electronic",
    "jazz",
    "classical",
    "metal",
    "reggae",
    "blues",
    "folk",
    "country",
    "latin",
    "soul",
    "punk",
    "disco",
    "funk",
    "rnb",
    "indie",
    "dance",
    "samba",
    "mpb",
    "sertanejo",
    "forro",
    "pagode",
    "bossa nova",
    "gospel",
];

pub fn fallback_genres() -> Vec<String> {
    FALLBACK_GENRES.iter().map(|g| g.to_string()).collect()
}

/// Trims, drops blanks and removes repeats, keeping the first occurrence
fn clean(genres: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    genres
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .filter(|g| seen.insert(g.clone()))
        .collect()
}

/// Picks the genre list: configured genres, then API seeds, then the fallback
pub async fn resolve_genres(configured: &[String], api: &dyn CatalogApi) -> Vec<String> {
    let configured = clean(configured.iter().cloned());
    if !configured.is_empty() {
        info!(genres = configured.len(), "Using configured genre list");
        return configured;
    }

    let seeds = clean(api.available_genres().await);
    if !seeds.is_empty() {
        info!(genres = seeds.len(), "Using genre seeds from the API");
        return seeds;
    }

    warn!("Genre seed listing is empty, using the built-in genre list");
    fallback_genres()
}

/// The rotation as loaded at the start of a run
#[derive(Debug, Clone)]
pub struct Scheduler {
    state: RotationState,
}

impl Scheduler {
    pub fn new(state: RotationState) -> Self {
        Self {
            state: state.normalized(),
        }
    }

    /// Loads the persisted rotation, initializing the genre list if needed
    ///
    /// Nothing is written here; the cursor is persisted by the caller after
    /// the batch ran.
    pub async fn load(
        store: &dyn CheckpointStore,
        configured: &[String],
        api: &dyn CatalogApi,
    ) -> Result<Self> {
        let state = match store.load_rotation()? {
            Some(state) if !state.is_empty() => state,
            _ => RotationState::new(resolve_genres(configured, api).await),
        };

        if state.is_empty() {
            return Err(HarvestError::NoGenres);
        }

        info!(
            genres = state.len(),
            index = state.index,
            next = ?state.next_genre(),
            "Loaded genre rotation"
        );
        Ok(Self::new(state))
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn genres(&self) -> &[String] {
        &self.state.genres
    }

    /// The `count` genres of the next batch, wrapping at the end of the list
    pub fn plan(&self, count: usize) -> Vec<String> {
        self.state.upcoming(count)
    }

    /// The rotation after a batch of `count` genres
    pub fn advance(&self, count: usize) -> RotationState {
        self.state.advance_by(count)
    }
}
