use crate::config::types::{Config, CrawlerConfig, FetcherConfig, SearchConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_storage_config(&config.storage)?;
    validate_search_config(&config.search)?;
    Ok(())
}

/// Validates worker pool and retry settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(workers) = config.workers {
        if !(1..=64).contains(&workers) {
            return Err(ConfigError::Validation(format!(
                "workers must be between 1 and 64, got {}",
                workers
            )));
        }
    }

    if config.extraction_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "extraction_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.commit_batch_size < 1 {
        return Err(ConfigError::Validation(
            "commit_batch_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher settings
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates search index settings
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.index.is_empty()
        || !config
            .index
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "index must be a non-empty lowercase name, got '{}'",
            config.index
        )));
    }

    if !(1..=1000).contains(&config.per_page) {
        return Err(ConfigError::Validation(format!(
            "per_page must be between 1 and 1000, got {}",
            config.per_page
        )));
    }

    if let Some(raw) = &config.elasticsearch_url {
        validate_endpoint(raw)?;
    }

    Ok(())
}

/// Validates that an endpoint is an absolute http(s) URL
pub(crate) fn validate_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid elasticsearch_url '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "elasticsearch_url '{}' must use http or https",
            raw
        )));
    }

    Ok(url)
}
