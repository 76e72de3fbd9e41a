//! Configuration module for Courtside
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing values fall back to defaults.
//!
//! # Example
//!
//! ```no_run
//! use courtside::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("courtside.toml")).unwrap();
//! println!("Retry cap: {}", config.crawler.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetcherBackend, FetcherConfig, SearchConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, ELASTICSEARCH_URL_ENV,
};
pub(crate) use validation::validate_endpoint;
