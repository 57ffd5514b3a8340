//! Configuration module for Genre-Harvest
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Values resolve in order: built-in defaults, the
//! file, environment variables, then command-line flags.
//!
//! # Example
//!
//! ```no_run
//! use genre_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Collecting {} artists per genre", config.collection.quantity);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, CollectionConfig, Config, OutputConfig, RetryConfig};

// Re-export parser functions
pub use parser::{
    apply_env, apply_env_with, compute_config_hash, load_config, load_config_with_hash,
    load_or_default, DEFAULT_CONFIG_HASH,
};
pub use validation::{validate, MAX_QUANTITY};
