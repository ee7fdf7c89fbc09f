use crate::config::types::{Config, CrawlerConfig, EnrichmentConfig, SiteTagConfig, TagsConfig};
use crate::url::MatchPattern;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Longest accepted settle time (ten minutes)
const MAX_SETTLE_TIME_MS: u64 = 600_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    if config.discovery_enabled() {
        validate_domain(&config.domain())?;
    }
    validate_tags_config(&config.tags)?;
    validate_site_tag_config(&config.site_tag)?;
    validate_enrichment_config(&config.enrichment)?;

    if config.output.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_page_url(&config.start_url, "start-url")?;

    for url in &config.urls {
        validate_page_url(url, "urls entry")?;
    }

    if config.settle_time > MAX_SETTLE_TIME_MS {
        return Err(ConfigError::Validation(format!(
            "settle-time must be <= {}ms, got {}ms",
            MAX_SETTLE_TIME_MS, config.settle_time
        )));
    }

    for pattern in &config.exclude {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid exclude pattern '{}': {}", pattern, e))
        })?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates tag extraction configuration
fn validate_tags_config(config: &TagsConfig) -> Result<(), ConfigError> {
    for id in &config.floodlight_config_ids {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Validation(format!(
                "floodlight-config-ids entries must be numeric, got '{}'",
                id
            )));
        }
    }

    if let Some(profile) = &config.profile_id {
        if profile.trim().is_empty() {
            return Err(ConfigError::Validation(
                "profile-id cannot be empty when set".to_string(),
            ));
        }
    }

    if let Some(patterns) = &config.monitor {
        if patterns.is_empty() {
            return Err(ConfigError::Validation(
                "monitor must list at least one pattern".to_string(),
            ));
        }
        for pattern in patterns {
            MatchPattern::parse(pattern)
                .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        }
    }

    Ok(())
}

/// Validates site-tag configuration
fn validate_site_tag_config(config: &SiteTagConfig) -> Result<(), ConfigError> {
    if let Some(click_id) = &config.click_id {
        if click_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "click-id cannot be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validates lookup service configuration
fn validate_enrichment_config(config: &EnrichmentConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base: {}", e)))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "api-base '{}' cannot be used as a base URL",
            config.api_base
        )));
    }
    Ok(())
}

/// Validates a page URL: must parse and use http or https
fn validate_page_url(url: &str, what: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, url
        )));
    }
    Ok(())
}

/// Validates a target domain (no scheme, no wildcard)
fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    // Check for invalid characters
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    // Check that it doesn't start or end with a dot or hyphen
    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') && domain != "localhost" {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
