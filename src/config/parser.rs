use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that overrides `search.elasticsearch-url`
pub const ELASTICSEARCH_URL_ENV: &str = "ELASTICSEARCH_URL";

/// Loads and parses a configuration file from the given path
///
/// The `ELASTICSEARCH_URL` environment variable, when set and non-empty,
/// replaces the configured search endpoint before validation.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use courtside::config::load_config;
///
/// let config = load_config(Path::new("courtside.toml")).unwrap();
/// println!("Workers: {}", config.crawler.worker_count());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    if let Ok(url) = std::env::var(ELASTICSEARCH_URL_ENV) {
        if !url.trim().is_empty() {
            config.search.elasticsearch_url = Some(url);
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded on every crawl run so results can be traced back to the
/// settings that produced them.
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
