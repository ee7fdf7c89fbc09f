//! Cookie jar shared by the HTTP client and the site-tag correlator
//!
//! Storage, `Set-Cookie` parsing, expiry and request matching are handled by
//! `cookie_store`. The jar plugs into `reqwest` as its cookie provider and
//! adds the per-domain listing and removal the correlator needs.

use super::CookieStore;
use async_trait::async_trait;
use cookie_store::{CookieDomain, CookieStore as Store};
use reqwest::header::HeaderValue;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// A snapshot of one stored cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,

    /// Domain without a leading dot, lowercased
    pub domain: String,

    pub path: String,

    /// Set without a `Domain` attribute; only sent to the exact host
    pub host_only: bool,
}

impl Cookie {
    /// A domain cookie for `domain` and its subdomains, path `/`
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.trim_start_matches('.').to_lowercase(),
            path: "/".to_string(),
            host_only: false,
        }
    }

    /// `name=value`
    pub fn descriptor(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// The `Set-Cookie` line recreating this cookie
    fn set_cookie_header(&self) -> String {
        if self.host_only {
            format!("{}; Path={}", self.descriptor(), self.path)
        } else {
            format!("{}; Domain={}; Path={}", self.descriptor(), self.domain, self.path)
        }
    }

    fn from_stored(cookie: &cookie_store::Cookie<'_>) -> Option<Self> {
        let (domain, host_only) = match &cookie.domain {
            CookieDomain::HostOnly(host) => (host.clone(), true),
            CookieDomain::Suffix(suffix) => (suffix.clone(), false),
            CookieDomain::NotPresent | CookieDomain::Empty => return None,
        };

        Some(Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain,
            path: String::from(&cookie.path),
            host_only,
        })
    }
}

/// True if a cookie stored for `cookie_domain` belongs under `domain`
fn under_domain(cookie_domain: &str, domain: &str) -> bool {
    cookie_domain == domain || cookie_domain.ends_with(&format!(".{}", domain))
}

/// A thread-safe cookie jar
#[derive(Debug, Default)]
pub struct CookieJar {
    store: Mutex<Store>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores or replaces a cookie
    pub fn insert(&self, cookie: Cookie) {
        let origin = format!("https://{}{}", cookie.domain, cookie.path);
        match Url::parse(&origin) {
            Ok(url) => self.store_response_cookie(&cookie.set_cookie_header(), &url),
            Err(e) => tracing::debug!("Cannot store cookie {}: {}", cookie.name, e),
        }
    }

    /// Applies a `Set-Cookie` header received in response to `request`
    ///
    /// A header that expires an existing cookie removes it.
    pub fn store_response_cookie(&self, header: &str, request: &Url) {
        if let Err(e) = self.lock().parse(header, request) {
            tracing::debug!("Ignoring Set-Cookie from {}: {}", request, e);
        }
    }

    /// The `Cookie` header value for a request to `url`, if any cookie applies
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let header = self
            .lock()
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        (!header.is_empty()).then_some(header)
    }

    pub fn len(&self) -> usize {
        self.lock().iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(value) = header.to_str() {
                self.store_response_cookie(value, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

#[async_trait]
impl CookieStore for CookieJar {
    async fn cookies_for_domain(&self, domain: &str) -> Vec<Cookie> {
        let domain = domain.trim_start_matches('.').to_lowercase();
        self.lock()
            .iter_unexpired()
            .filter_map(Cookie::from_stored)
            .filter(|c| under_domain(&c.domain, &domain))
            .collect()
    }

    async fn remove_cookie(&self, url: &str, name: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };

        let mut store = self.lock();
        let targets: Vec<Cookie> = store
            .matches(&url)
            .into_iter()
            .filter(|c| c.name() == name)
            .filter_map(|c| Cookie::from_stored(c))
            .collect();

        targets
            .iter()
            .filter(|c| store.remove(&c.domain, &c.path, &c.name).is_some())
            .count()
            > 0
    }
}
