//! Genre-Harvest: a genre-rotating collector for the Spotify catalog
//!
//! This crate implements a batch pipeline that discovers artists by genre,
//! fetches their top tracks, keeps every API response in an append-only raw
//! layer, validates and normalizes the payloads into a processed layer, and
//! loads the result into a local SQLite database. Per-genre checkpoints and
//! a round-robin rotation file let repeated invocations pick up where the
//! previous one stopped.

pub mod catalog;
pub mod collector;
pub mod config;
pub mod output;
pub mod state;
pub mod storage;
pub mod validation;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Genre-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("No genres available for rotation")]
    NoGenres,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while talking to the catalog API
///
/// The variants follow the retry taxonomy: `Transient` and `RateLimited`
/// are retried by the fetcher, everything else propagates on first sight.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limited on {url} (retry after {retry_after:?})")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("Transient failure on {url}: {message}")]
    Transient { url: String, message: String },

    #[error("Fatal response from {url} (status {status:?}): {message}")]
    Fatal {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set")]
    MissingCredentials,

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] ::url::ParseError),
}

impl ApiError {
    /// Returns true if the fetcher may try the request again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    /// Returns true if the error must abort the current call chain
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Server-provided wait hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Genre-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

// Re-export commonly used types
pub use catalog::{Artist, ProcessedTrack, RawBatch};
pub use collector::{CollectionResult, Coordinator};
pub use config::Config;
pub use state::{GenreCheckpoint, GenreStatus, RotationState};
