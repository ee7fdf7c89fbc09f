use crate::tags::{RecordKeyStrategy, DEFAULT_API_BASE};
use crate::url::split_host;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Tagwalk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(rename = "site-tag", default)]
    pub site_tag: SiteTagConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// The target domain: the configured one, or the start URL's host
    /// without `www.`
    pub fn domain(&self) -> String {
        match &self.crawler.domain {
            Some(domain) => domain.trim().to_lowercase(),
            None => split_host(&self.crawler.start_url)
                .map(|(_, host)| host.to_lowercase())
                .unwrap_or_default(),
        }
    }

    /// True if pages are found by scraping links rather than from a list
    pub fn discovery_enabled(&self) -> bool {
        self.crawler.urls.is_empty()
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Page the crawl starts from
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Domain the crawl stays on
    #[serde(default)]
    pub domain: Option<String>,

    /// Time to let a page's tracking calls fire after it loads (milliseconds)
    #[serde(rename = "settle-time", default = "default_settle_time")]
    pub settle_time: u64,

    /// Observe a manually driven browser instead of navigating
    #[serde(default)]
    pub manual: bool,

    /// Explicit pages to visit; disables link discovery
    #[serde(default)]
    pub urls: Vec<String>,

    /// Query text appended to the starting URL
    #[serde(rename = "url-suffix", default)]
    pub url_suffix: String,

    /// Regexes for URLs that must never be visited
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_time)
    }
}

/// Tag extraction configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsConfig {
    /// Add a placeholder row for visited pages without tags
    #[serde(rename = "show-empty-pages", default)]
    pub show_empty_pages: bool,

    #[serde(rename = "record-key", default)]
    pub record_key: RecordKeyStrategy,

    /// Floodlight advertisers to keep; empty keeps all
    #[serde(rename = "floodlight-config-ids", default)]
    pub floodlight_config_ids: Vec<String>,

    /// Profile used for floodlight ID lookups
    #[serde(rename = "profile-id", default)]
    pub profile_id: Option<String>,

    /// Replaces the built-in monitored URL patterns
    #[serde(default)]
    pub monitor: Option<Vec<String>>,
}

/// Global site tag verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteTagConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Send container script requests with `Cache-Control: no-cache`
    #[serde(rename = "disable-cache", default = "default_true")]
    pub disable_cache: bool,

    /// Clear target-domain cookies before each page load
    #[serde(rename = "reset-cookies", default)]
    pub reset_cookies: bool,

    /// Session click ID; generated when unset
    #[serde(rename = "click-id", default)]
    pub click_id: Option<String>,

    #[serde(rename = "click-source", default = "default_click_source")]
    pub click_source: String,
}

impl Default for SiteTagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            disable_cache: true,
            reset_cookies: false,
            click_id: None,
            click_source: default_click_source(),
        }
    }
}

/// Floodlight ID lookup service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(rename = "api-base", default = "default_api_base")]
    pub api_base: String,

    #[serde(rename = "access-token", default)]
    pub access_token: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory report files are written to
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_settle_time() -> u64 {
    5000
}

fn default_user_agent() -> String {
    format!("tagwalk/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_click_source() -> String {
    "aw.ds".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}
