use crate::{UrlError, UrlResult};
use regex::Regex;
use std::sync::LazyLock;

/// Splits a URL into its scheme+host(+port) prefix and bare host
static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:[^@/?#\n]+@)?(?:www\.)?([^:/?#\n]+)(?::\d+)?").unwrap()
});

/// Returns `(base, host)` for a URL
///
/// `base` is everything up to the end of the host and port (scheme,
/// credentials and `www.` included) and is what root-relative links get
/// appended to. `host`
/// is the host with any `www.` prefix removed.
///
/// # Examples
///
/// ```
/// use tagwalk::url::split_host;
///
/// let (base, host) = split_host("https://www.example.com/shop?x=1").unwrap();
/// assert_eq!(base, "https://www.example.com");
/// assert_eq!(host, "example.com");
/// ```
pub fn split_host(url: &str) -> Option<(&str, &str)> {
    let captures = HOST_PATTERN.captures(url)?;
    let base = captures.get(0)?.as_str();
    let host = captures.get(1)?.as_str();
    Some((base, host))
}

/// The domain a run is restricted to
///
/// A scope built from an empty domain accepts everything; this is used when
/// the run visits an explicit URL list instead of discovering pages.
#[derive(Debug, Clone)]
pub struct DomainScope {
    domain: String,
    /// Anchored match for absolute links on the target domain
    link_pattern: Option<Regex>,
    /// Unanchored match for "this URL belongs to the target domain"
    page_pattern: Option<Regex>,
}

impl DomainScope {
    /// Creates a scope for `domain` (e.g. `example.com`)
    pub fn new(domain: &str) -> UrlResult<Self> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Ok(Self::any());
        }

        let escaped = regex::escape(&domain);
        let link_pattern = Regex::new(&format!(
            r"(?i)^(?:https?://)?(?:www\.)?{}(?::\d+)?(?:/.*)?$",
            escaped
        ))
        .map_err(|e| UrlError::InvalidPattern(e.to_string()))?;
        let page_pattern = Regex::new(&format!("(?i){}", escaped))
            .map_err(|e| UrlError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            domain,
            link_pattern: Some(link_pattern),
            page_pattern: Some(page_pattern),
        })
    }

    /// Creates a scope that accepts every URL
    pub fn any() -> Self {
        Self {
            domain: String::new(),
            link_pattern: None,
            page_pattern: None,
        }
    }

    /// The target domain, empty for an unrestricted scope
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_any(&self) -> bool {
        self.domain.is_empty()
    }

    /// Returns true if `link` is an absolute link on the target domain
    ///
    /// `https://example.com/a`, `http://www.example.com` and `example.com/a`
    /// all match `example.com`; `https://cdn.example.com/a` does not.
    pub fn matches_link(&self, link: &str) -> bool {
        match &self.link_pattern {
            Some(pattern) => pattern.is_match(link),
            None => true,
        }
    }

    /// Returns true if the target domain appears anywhere in `url`
    ///
    /// This is the loose check used for originating pages and initiators,
    /// so subdomains of the target are accepted.
    pub fn contains(&self, url: &str) -> bool {
        match &self.page_pattern {
            Some(pattern) => pattern.is_match(url),
            None => true,
        }
    }

    /// Returns true if `host` (without `www.`) is exactly the target domain
    pub fn is_target_host(&self, host: &str) -> bool {
        self.is_any() || host.eq_ignore_ascii_case(&self.domain)
    }
}
