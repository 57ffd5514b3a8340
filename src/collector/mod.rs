//! Collector module for catalog fetching and orchestration
//!
//! This module contains the core collection logic, including:
//! - HTTP fetching with authentication and retry logic
//! - Artist discovery through an ordered strategy chain
//! - Genre rotation scheduling for batch runs
//! - Overall collection coordination

mod coordinator;
pub mod discovery;
mod fetcher;
mod retry;
mod scheduler;
mod traits;

pub use coordinator::{
    BatchOutcome, CollectRequest, CollectionResult, Coordinator, GenreFailure, MAX_BATCH_GENRES,
};
pub use discovery::{
    artists_from_tracks, Discovery, DiscoveryChain, DiscoveryStrategy, GenreSearch,
    PlaylistSearch,
};
pub use fetcher::{build_http_client, Credentials, SpotifyClient};
pub use retry::RetryPolicy;
pub use scheduler::{fallback_genres, resolve_genres, Scheduler, FALLBACK_GENRES};
pub use traits::CatalogApi;
