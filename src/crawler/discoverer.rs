//! Link discovery over rendered page markup
//!
//! Links are pulled out of the markup with a plain `href="..."` scan rather
//! than a DOM walk, so anything that serializes an `href` attribute (anchors,
//! area maps, link tags) is a candidate.
//!
//! # Filtering Rules
//!
//! **Dropped during extraction:**
//! - Fragment-only links (`#reviews`, `/#top`) and the bare root `/`
//! - Links to non-content assets (scripts, styles, images, fonts, documents,
//!   data files)
//!
//! **Dropped during scoping:**
//! - `mailto:`, `javascript:`, protocol-relative `//` and extension-scheme
//!   links
//! - Absolute links that are not on the target domain
//! - Root-relative links found on a page whose host is not the target domain

use crate::url::{scrub_url, split_host, DomainScope};
use regex::Regex;
use std::sync::LazyLock;

static HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"href="(.*?)""#).unwrap());

static ASSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[/.](?:json|js|pdf|css|jpg|png|xml|jpeg|gif|webp|svgz?|heif|heic|ico|otf|ttf|eot|woff2?)(?:[/?#]|$)",
    )
    .unwrap()
});

const REJECTED_PREFIXES: &[&str] = &["mailto:", "javascript:", "//", "chrome-extension:"];

/// Extracts raw `href` values from markup, minus anchors and asset links
///
/// # Examples
///
/// ```
/// use tagwalk::crawler::extract_hrefs;
///
/// let html = r##"<a href="/about">About</a><a href="#top">Top</a><link href="/site.css">"##;
/// assert_eq!(extract_hrefs(html), vec!["/about"]);
/// ```
pub fn extract_hrefs(markup: &str) -> Vec<&str> {
    HREF_PATTERN
        .captures_iter(markup)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|href| !is_anchor(href) && !ASSET_PATTERN.is_match(href))
        .collect()
}

fn is_anchor(href: &str) -> bool {
    href.starts_with("/#") || href.starts_with('#') || href == "/"
}

/// Scopes scraped links to the target domain and normalizes them
#[derive(Debug, Clone)]
pub struct LinkDiscoverer {
    scope: DomainScope,
}

impl LinkDiscoverer {
    pub fn new(scope: DomainScope) -> Self {
        Self { scope }
    }

    /// Returns normalized in-scope links found in `markup`
    ///
    /// `page_url` is the URL the markup was loaded from; it supplies the
    /// scheme and host for root-relative links.
    pub fn discover(&self, markup: &str, page_url: &str) -> Vec<String> {
        let current = split_host(page_url);
        let on_target = current
            .map(|(_, host)| self.scope.is_target_host(host))
            .unwrap_or(false);

        let mut links = Vec::new();
        for href in extract_hrefs(markup) {
            let href = href.trim();
            if REJECTED_PREFIXES.iter().any(|p| href.starts_with(p)) {
                continue;
            }

            let candidate = if href.starts_with('/') {
                match current {
                    Some((base, _)) if on_target => format!("{}{}", base, href),
                    _ => {
                        tracing::debug!("Dropping relative link {} from off-domain page", href);
                        continue;
                    }
                }
            } else if self.scope.matches_link(href) {
                href.to_string()
            } else {
                continue;
            };

            let clean = scrub_url(&candidate);
            if !clean.is_empty() {
                links.push(clean);
            }
        }

        links
    }
}
