//! The catalog API seen by discovery and the coordinator

use crate::catalog::{Artist, PlaylistSummary};
use crate::ApiResult;
use async_trait::async_trait;
use serde_json::Value;

/// Read access to the music catalog
///
/// `SpotifyClient` talks HTTP; tests substitute in-memory fakes.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Genre seeds offered by the API; empty when the listing is unavailable
    async fn available_genres(&self) -> Vec<String>;

    /// Artists tagged with `genre`, at most `limit`, in API order
    async fn search_artists(&self, genre: &str, limit: usize) -> ApiResult<Vec<Artist>>;

    /// Playlists matching a keyword query, most relevant first
    async fn search_playlists(&self, query: &str, limit: usize)
        -> ApiResult<Vec<PlaylistSummary>>;

    /// Every track object of a playlist, following pagination to the end
    async fn playlist_tracks(&self, playlist_id: &str) -> ApiResult<Vec<Value>>;

    /// The top-tracks response of an artist, as received
    async fn artist_top_tracks(&self, artist_id: &str, market: &str) -> ApiResult<Value>;
}
