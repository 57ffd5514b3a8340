use crate::config::types::{ApiConfig, CollectionConfig, Config, OutputConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound for artists per genre; search stops paging at offset 1000
pub const MAX_QUANTITY: usize = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_retry_config(&config.retry)?;
    validate_collection_config(&config.collection)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("accounts-url", &config.accounts_url),
        ("base-url", &config.base_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    if config.page_size < 1 || config.page_size > 50 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 50, got {}",
            config.page_size
        )));
    }

    if config.playlist_candidates < 1 {
        return Err(ConfigError::Validation(
            "playlist-candidates must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    // Above 1.0 the jittered sequence could shrink between attempts
    if !(0.0..=1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be within [0, 1], got {}",
            config.jitter
        )));
    }

    Ok(())
}

fn validate_collection_config(config: &CollectionConfig) -> Result<(), ConfigError> {
    if config.genre.trim().is_empty() {
        return Err(ConfigError::Validation("genre cannot be empty".to_string()));
    }

    if config.quantity < 1 || config.quantity > MAX_QUANTITY {
        return Err(ConfigError::Validation(format!(
            "quantity must be between 1 and {}, got {}",
            MAX_QUANTITY, config.quantity
        )));
    }

    validate_market(&config.market)?;

    if let Some(blank) = config.genres.iter().position(|g| g.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "genres[{}] cannot be empty",
            blank
        )));
    }

    if config.ranking_size < 1 {
        return Err(ConfigError::Validation(
            "ranking-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Market codes are ISO 3166-1 alpha-2
fn validate_market(market: &str) -> Result<(), ConfigError> {
    if market.len() != 2 || !market.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "market must be a two-letter uppercase country code, got '{}'",
            market
        )));
    }
    Ok(())
}
