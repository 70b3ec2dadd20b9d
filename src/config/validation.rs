use crate::config::types::{Config, DiscoveryConfig, FetchConfig, SelectorTable, StorageConfig};
use crate::crawler::proxy_url;
use crate::storage::MAX_ASSET_SLOTS;
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_discovery_config(&config.discovery)?;
    validate_fetch_config(&config.fetch)?;
    validate_storage_config(&config.storage)?;
    validate_selector_table(&config.extraction)?;
    Ok(())
}

/// Validates discovery loop configuration
fn validate_discovery_config(config: &DiscoveryConfig) -> Result<(), ConfigError> {
    Url::parse(&config.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start-url: {}", e)))?;

    Url::parse(&config.item_url_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid item-url-base: {}", e)))?;

    validate_selector("item-selector", &config.item_selector)?;
    validate_selector("link-selector", &config.link_selector)?;

    if config.id_attribute.is_empty() {
        return Err(ConfigError::Validation(
            "id-attribute cannot be empty".to_string(),
        ));
    }

    let pattern = Regex::new(&config.id_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("id-pattern '{}': {}", config.id_pattern, e))
    })?;
    if pattern.captures_len() < 2 {
        return Err(ConfigError::InvalidPattern(format!(
            "id-pattern '{}' must contain a capture group for the identifier",
            config.id_pattern
        )));
    }

    if config.max_iterations < 1 || config.max_iterations > 50_000 {
        return Err(ConfigError::Validation(format!(
            "max-iterations must be between 1 and 50000, got {}",
            config.max_iterations
        )));
    }

    for (name, value) in [
        ("stagnation-threshold", config.stagnation_threshold),
        (
            "unchanged-extent-threshold",
            config.unchanged_extent_threshold,
        ),
        ("flush-interval", config.flush_interval),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.flush_batch_size < 1 {
        return Err(ConfigError::Validation(
            "flush-batch-size must be >= 1".to_string(),
        ));
    }

    if config.render_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "render-timeout-ms must be >= 100ms, got {}ms",
            config.render_timeout_ms
        )));
    }

    if config.initial_wait_min_ms > config.initial_wait_max_ms {
        return Err(ConfigError::Validation(format!(
            "initial-wait-min-ms ({}) cannot exceed initial-wait-max-ms ({})",
            config.initial_wait_min_ms, config.initial_wait_max_ms
        )));
    }

    Ok(())
}

/// Validates HTTP fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    for (name, value) in [
        ("request-timeout-ms", config.request_timeout_ms),
        ("asset-timeout-ms", config.asset_timeout_ms),
    ] {
        if value < 100 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 100ms, got {}ms",
                name, value
            )));
        }
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter-min-ms ({}) cannot exceed jitter-max-ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms ({}) cannot exceed backoff-max-ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    if config.user_agents.iter().all(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agents must contain at least one non-empty entry".to_string(),
        ));
    }

    for proxy in &config.proxies {
        reqwest::Proxy::all(proxy_url(proxy))
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates persistence configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database-path", &config.database_path),
        ("raw-root", &config.raw_root),
        ("asset-root", &config.asset_root),
        ("item-id-param", &config.item_id_param),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.raw_shard_size < 1 || config.asset_shard_size < 1 {
        return Err(ConfigError::Validation(format!(
            "shard sizes must be >= 1, got raw={} asset={}",
            config.raw_shard_size, config.asset_shard_size
        )));
    }

    Ok(())
}

/// Validates the extraction selector table
fn validate_selector_table(table: &SelectorTable) -> Result<(), ConfigError> {
    if table.external_id.is_empty() {
        return Err(ConfigError::Validation(
            "extraction.external-id needs at least one selector".to_string(),
        ));
    }

    if table.assets.len() > MAX_ASSET_SLOTS {
        return Err(ConfigError::Validation(format!(
            "extraction.assets supports at most {} slots, got {}",
            MAX_ASSET_SLOTS,
            table.assets.len()
        )));
    }

    if table.asset_attribute.is_empty() {
        return Err(ConfigError::Validation(
            "extraction.asset-attribute cannot be empty".to_string(),
        ));
    }

    let fields = [
        ("brand", &table.brand),
        ("name", &table.name),
        ("external-id", &table.external_id),
        ("price", &table.price),
        ("assets", &table.assets),
    ];
    for (field, selectors) in fields {
        for selector in selectors {
            validate_selector(&format!("extraction.{}", field), selector)?;
        }
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(field: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("{} '{}': {:?}", field, selector, e)))
}
