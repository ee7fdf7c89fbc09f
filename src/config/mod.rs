//! Configuration module for Tagwalk
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tagwalk::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tagwalk.toml")).unwrap();
//! println!("Crawl stays on: {}", config.domain());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, EnrichmentConfig, OutputConfig, SiteTagConfig, TagsConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
