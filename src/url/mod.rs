//! URL handling module for Tagwalk
//!
//! This module provides page-key normalization, domain scoping, host match
//! patterns and starting-URL construction.

mod domain;
mod matcher;
mod normalize;
mod params;

// Re-export main types and functions
pub use domain::{split_host, DomainScope};
pub use matcher::{matches_wildcard, MatchPattern, UrlPatternSet};
pub use normalize::{scrub_url, PageKey};
pub use params::construct_url;
