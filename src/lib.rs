//! Tagwalk: a single-site tag auditor
//!
//! This crate drives an automated walk of one web site and, while it does,
//! watches the advertising and analytics calls each page fires. Calls are
//! classified by vendor, their fields extracted and aggregated per page, and
//! a warnings report is produced. A separate correlator checks container
//! script (global site tag) presence against first-party click cookies.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod output;
pub mod sitetag;
pub mod state;
pub mod tags;
pub mod url;

use thiserror::Error;

/// Main error type for Tagwalk operations
#[derive(Debug, Error)]
pub enum TagwalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Floodlight lookup error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid match pattern: {0}")]
    InvalidPattern(String),
}

/// Errors reported by the host browser collaborator
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("No page loaded in tab {0}")]
    NoPage(u32),
}

/// Errors from the asynchronous floodlight ID lookup
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lookup service returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode lookup response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid lookup endpoint: {0}")]
    Endpoint(#[from] ::url::ParseError),
}

/// Result type alias for Tagwalk operations
pub type Result<T> = std::result::Result<T, TagwalkError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for browser operations
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunEvent, RunHandle, RunReport};
pub use state::FrontierState;
pub use url::{scrub_url, DomainScope, PageKey};
