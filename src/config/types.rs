use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Genre-Harvest
///
/// Every section is optional in the TOML file; missing keys fall back to
/// the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub collection: CollectionConfig,
    pub output: OutputConfig,
}

/// Catalog API endpoints and paging
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Base URL of the OAuth accounts service
    pub accounts_url: String,

    /// Base URL of the Web API
    pub base_url: String,

    /// Overall request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Items requested per search page (the API allows at most 50)
    pub page_size: u32,

    /// Playlists considered when falling back to playlist discovery
    pub playlist_candidates: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            accounts_url: "https://accounts.spotify.com".to_string(),
            base_url: "https://api.spotify.com/v1".to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
            page_size: 50,
            playlist_candidates: 5,
        }
    }
}

/// Retry/backoff parameters shared by every outbound call
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per request, the first one included
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,

    /// Upper bound for any computed delay (milliseconds)
    pub max_delay_ms: u64,

    /// Jitter ratio in [0, 1] added on top of the exponential delay
    pub jitter: f64,

    /// Longest server-requested `Retry-After` wait honored (milliseconds)
    pub max_retry_after_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.2,
            max_retry_after_ms: 60_000,
        }
    }
}

/// What to collect
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollectionConfig {
    /// Genre used by single-genre runs
    pub genre: String,

    /// Artists collected per genre
    pub quantity: usize,

    /// Market code for top-tracks lookups
    pub market: String,

    /// Fixed rotation list; empty means "ask the API, then fall back"
    pub genres: Vec<String>,

    /// Tracks kept in each per-genre ranking
    pub ranking_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            genre: "rock".to_string(),
            quantity: 10,
            market: "BR".to_string(),
            genres: Vec::new(),
            ranking_size: 20,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root of the raw/processed/checkpoint layout
    pub data_dir: PathBuf,

    /// SQLite database; defaults to `<data-dir>/spotify.db`
    pub database_path: Option<PathBuf>,

    /// Rotation state file; defaults to `<data-dir>/checkpoints/genre_rotation.json`
    pub rotation_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_path: None,
            rotation_file: None,
        }
    }
}

impl OutputConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("spotify.db"))
    }

    pub fn rotation_path(&self) -> PathBuf {
        self.rotation_file.clone().unwrap_or_else(|| {
            self.data_dir
                .join("checkpoints")
                .join("genre_rotation.json")
        })
    }
}
