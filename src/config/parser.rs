use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hash recorded for runs that use the built-in defaults
pub const DEFAULT_CONFIG_HASH: &str = "defaults";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use genre_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Market: {}", config.collection.market);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with every run so collections made under different settings can
/// be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Loads the given file, or the defaults when no file was named
pub fn load_or_default(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    match path {
        Some(path) => load_config_with_hash(path),
        None => Ok((Config::default(), DEFAULT_CONFIG_HASH.to_string())),
    }
}

/// Overrides collection defaults from `SPOTIFY_GENRE`,
/// `SPOTIFY_ARTIST_QUANTITY`, `SPOTIFY_MARKET` and `DATA_DIR`
pub fn apply_env(config: &mut Config) -> Result<(), ConfigError> {
    apply_env_with(config, |key| std::env::var(key).ok())
}

/// Same as `apply_env`, reading variables through `lookup`
///
/// Blank values are ignored. The result is validated again.
pub fn apply_env_with<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(genre) = var("SPOTIFY_GENRE") {
        config.collection.genre = genre;
    }
    if let Some(quantity) = var("SPOTIFY_ARTIST_QUANTITY") {
        config.collection.quantity = quantity.parse().map_err(|_| {
            ConfigError::Validation(format!(
                "SPOTIFY_ARTIST_QUANTITY must be a positive integer, got '{}'",
                quantity
            ))
        })?;
    }
    if let Some(market) = var("SPOTIFY_MARKET") {
        config.collection.market = market.to_uppercase();
    }
    if let Some(data_dir) = var("DATA_DIR") {
        config.output.data_dir = data_dir.into();
    }

    validate(config)
}
