//! Artist discovery
//!
//! Discovery is an ordered chain of strategies. The chain asks each strategy
//! in turn and stops at the first one that finds any artist; an error from a
//! strategy aborts the chain rather than counting as "nothing found".

use crate::catalog::Artist;
use crate::collector::traits::CatalogApi;
use crate::ApiResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// One way of finding artists for a genre
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Short name recorded in checkpoints and logs
    fn name(&self) -> &'static str;

    async fn discover(
        &self,
        api: &dyn CatalogApi,
        genre: &str,
        limit: usize,
    ) -> ApiResult<Vec<Artist>>;
}

/// Direct `genre:"<genre>"` artist search
#[derive(Debug, Default, Clone, Copy)]
pub struct GenreSearch;

#[async_trait]
impl DiscoveryStrategy for GenreSearch {
    fn name(&self) -> &'static str {
        "genre_search"
    }

    async fn discover(
        &self,
        api: &dyn CatalogApi,
        genre: &str,
        limit: usize,
    ) -> ApiResult<Vec<Artist>> {
        api.search_artists(genre, limit).await
    }
}

/// Artists credited on the most relevant playlist for the genre keyword
#[derive(Debug, Clone, Copy)]
pub struct PlaylistSearch {
    /// How many playlists to ask the search for
    pub candidates: usize,
}

impl Default for PlaylistSearch {
    fn default() -> Self {
        Self { candidates: 5 }
    }
}

/// Unique artists credited on `tracks`, in first-appearance order
pub fn artists_from_tracks(tracks: &[Value]) -> Vec<Artist> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter_map(|track| track.get("artists").and_then(Value::as_array))
        .flatten()
        .filter_map(Artist::from_value)
        .filter(|artist| seen.insert(artist.id.clone()))
        .collect()
}

#[async_trait]
impl DiscoveryStrategy for PlaylistSearch {
    fn name(&self) -> &'static str {
        "playlist_search"
    }

    async fn discover(
        &self,
        api: &dyn CatalogApi,
        genre: &str,
        limit: usize,
    ) -> ApiResult<Vec<Artist>> {
        let playlists = api.search_playlists(genre, self.candidates.max(1)).await?;

        // The API orders by relevance, so the first playlist wins ties
        let Some(playlist) = playlists.into_iter().next() else {
            debug!(genre = %genre, "No playlist matched");
            return Ok(Vec::new());
        };

        let tracks = api.playlist_tracks(&playlist.id).await?;
        let mut artists = artists_from_tracks(&tracks);
        artists.truncate(limit);

        info!(
            genre = %genre,
            playlist_id = %playlist.id,
            playlist = %playlist.name,
            tracks = tracks.len(),
            artists = artists.len(),
            "Derived artists from playlist"
        );
        Ok(artists)
    }
}

/// Artists found for a genre and the strategy that found them
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub artists: Vec<Artist>,
    /// None when every strategy came back empty
    pub strategy: Option<&'static str>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}

/// Ordered list of discovery strategies
pub struct DiscoveryChain {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl DiscoveryChain {
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// Genre search first, then the playlist fallback
    pub fn standard(playlist_candidates: usize) -> Self {
        Self::new(vec![
            Box::new(GenreSearch),
            Box::new(PlaylistSearch {
                candidates: playlist_candidates,
            }),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Returns the first non-empty result
    pub async fn discover_artists(
        &self,
        api: &dyn CatalogApi,
        genre: &str,
        limit: usize,
    ) -> ApiResult<Discovery> {
        for strategy in &self.strategies {
            let artists = strategy.discover(api, genre, limit).await?;
            if !artists.is_empty() {
                info!(
                    genre = %genre,
                    strategy = strategy.name(),
                    artists = artists.len(),
                    "Discovered artists"
                );
                return Ok(Discovery {
                    artists,
                    strategy: Some(strategy.name()),
                });
            }
            debug!(genre = %genre, strategy = strategy.name(), "Strategy found nothing");
        }

        Ok(Discovery::default())
    }
}

impl Default for DiscoveryChain {
    fn default() -> Self {
        Self::standard(PlaylistSearch::default().candidates)
    }
}
