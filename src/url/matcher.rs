use crate::{UrlError, UrlResult};
use regex::Regex;
use url::Url;

/// Network calls the tag extractor is shown
pub const MONITORED_PATTERNS: &[&str] = &[
    "*://*.fls.doubleclick.net/activityi*",
    "*://*.fls.doubleclick.net/activityj*",
    "*://ad.doubleclick.net/activity*",
    "*://ad.doubleclick.net/ddm/activity*",
    "*://stats.g.doubleclick.net/r/collect/*",
    "*://*.google-analytics.com/*",
    "*://*.g.doubleclick.net/pagead/viewthroughconversion/*",
    "*://*.googleadservices.com/pagead/conversion/*",
];

/// Container script loads the site-tag correlator listens to
pub const SITE_TAG_PATTERNS: &[&str] = &["*://www.googletagmanager.com/*"];

/// Checks if a host matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare host)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// A lone `*` matches every host.
///
/// # Examples
///
/// ```
/// use tagwalk::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.fls.doubleclick.net", "fls.doubleclick.net"));
/// assert!(matches_wildcard("*.fls.doubleclick.net", "1234.fls.doubleclick.net"));
/// assert!(!matches_wildcard("*.fls.doubleclick.net", "doubleclick.net"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemeFilter {
    /// `*` in the pattern: http or https
    Web,
    Exact(String),
}

/// A browser-extension style match pattern: `<scheme>://<host><path>`
///
/// - scheme is `http`, `https` or `*` (either of the two)
/// - host is `*`, an exact host, or `*.` followed by a host
/// - path is a glob where `*` matches any run of characters; it is compared
///   against the request path including its query string
///
/// Ports are ignored.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    scheme: SchemeFilter,
    host: String,
    path: Regex,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> UrlResult<Self> {
        let invalid = || UrlError::InvalidPattern(pattern.to_string());

        let (scheme, rest) = pattern.split_once("://").ok_or_else(invalid)?;
        let scheme = match scheme {
            "*" => SchemeFilter::Web,
            "http" | "https" => SchemeFilter::Exact(scheme.to_string()),
            _ => return Err(invalid()),
        };

        let slash = rest.find('/').ok_or_else(invalid)?;
        let (host, path) = rest.split_at(slash);
        let bare = host.strip_prefix("*.").unwrap_or(host);
        if host.is_empty() || (host != "*" && bare.contains('*')) {
            return Err(invalid());
        }

        let glob = path
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let path = Regex::new(&format!("^{}$", glob)).map_err(|_| invalid())?;

        Ok(Self {
            source: pattern.to_string(),
            scheme,
            host: host.to_lowercase(),
            path,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if `url` matches this pattern
    pub fn matches(&self, url: &Url) -> bool {
        let scheme_ok = match &self.scheme {
            SchemeFilter::Web => matches!(url.scheme(), "http" | "https"),
            SchemeFilter::Exact(s) => url.scheme() == s,
        };
        if !scheme_ok {
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        if !matches_wildcard(&self.host, &host.to_lowercase()) {
            return false;
        }

        match url.query() {
            Some(query) => self.path.is_match(&format!("{}?{}", url.path(), query)),
            None => self.path.is_match(url.path()),
        }
    }
}

/// An ordered list of match patterns; a URL matches if any pattern does
#[derive(Debug, Clone, Default)]
pub struct UrlPatternSet {
    patterns: Vec<MatchPattern>,
}

impl UrlPatternSet {
    pub fn parse_all<S: AsRef<str>>(patterns: &[S]) -> UrlResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| MatchPattern::parse(p.as_ref()))
            .collect::<UrlResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// The default list of monitored tag endpoints
    pub fn monitored() -> UrlResult<Self> {
        Self::parse_all(MONITORED_PATTERNS)
    }

    /// The container script endpoints
    pub fn site_tag() -> UrlResult<Self> {
        Self::parse_all(SITE_TAG_PATTERNS)
    }

    /// Returns true if any pattern matches; unparseable URLs never match
    pub fn matches(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.patterns.iter().any(|p| p.matches(&parsed)),
            Err(_) => false,
        }
    }

    pub fn extend(&mut self, other: UrlPatternSet) {
        self.patterns.extend(other.patterns);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchPattern> {
        self.patterns.iter()
    }
}
