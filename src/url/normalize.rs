use std::fmt;

/// A page URL normalized for use as a map key
///
/// Both the tag tracker and the site-tag correlator key their per-page state
/// by `PageKey`, so two URLs that differ only in query string, fragment or
/// trailing slashes land on the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey(String);

impl PageKey {
    /// Normalizes `url` into a page key
    ///
    /// # Examples
    ///
    /// ```
    /// use tagwalk::url::PageKey;
    ///
    /// let key = PageKey::new("http://a.com/x/?q=1#f");
    /// assert_eq!(key.as_str(), "http://a.com/x");
    /// ```
    pub fn new(url: &str) -> Self {
        Self(scrub_url(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageKey {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

/// Strips the query string, fragment and trailing slashes from a URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Cut everything from the first `?` or `#`
/// 3. Remove trailing `/` characters (and any whitespace exposed by the cut)
///
/// The result is a fixed point: scrubbing it again returns it unchanged.
///
/// # Examples
///
/// ```
/// use tagwalk::url::scrub_url;
///
/// assert_eq!(scrub_url("https://example.com/page/"), "https://example.com/page");
/// assert_eq!(scrub_url("https://example.com/?gclid=1"), "https://example.com");
/// ```
pub fn scrub_url(url: &str) -> String {
    let url = url.trim();
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());

    url[..end]
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}
