use crate::browser::{CookieStore, NetworkCall, TabId, TabStatus, TabUpdate};
use crate::output::{render_table, OutputResult, ReportTable};
use crate::url::{split_host, DomainScope, PageKey};
use indexmap::IndexMap;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

static CONTAINER_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"googletagmanager\.com").unwrap());
static CONTAINER_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"js\?id=([\w-]*)").unwrap());

/// Report header for the site-tag export
pub const SITE_TAG_REPORT_HEADER: &[&str] = &["URL", "AccountIDs", "Cookies"];

/// Generates a session click identifier of the form `Test-N`, N in 1..=1000
pub fn generate_click_id() -> String {
    format!("Test-{}", rand::rng().random_range(1..=1000))
}

/// First-party click cookie families correlated with container loads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieFamily {
    /// Floodlight click cookie
    Dc,
    /// Ads click cookie
    Aw,
}

impl CookieFamily {
    pub const ALL: [CookieFamily; 2] = [CookieFamily::Dc, CookieFamily::Aw];

    pub fn cookie_name(&self) -> &'static str {
        match self {
            Self::Dc => "_gcl_dc",
            Self::Aw => "_gcl_aw",
        }
    }

    /// True if a `name=value` descriptor belongs to this family
    fn owns(&self, descriptor: &str) -> bool {
        descriptor
            .split_once('=')
            .map(|(name, _)| name.contains(self.cookie_name()))
            .unwrap_or(false)
    }
}

/// Which events the correlator listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationScope {
    /// Any tab whose initiator is on the target domain
    Manual,

    /// Only the designated crawl tab
    Tab(TabId),
}

/// Container IDs and click cookies seen on one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSiteTagEntry {
    pub id: usize,
    pub page: String,

    /// Container IDs, in discovery order, without duplicates
    pub tags: Vec<String>,

    /// `name=value` cookie descriptors, at most one per [`CookieFamily`]
    pub cookies: Vec<String>,
}

impl GlobalSiteTagEntry {
    fn new(id: usize, page: &PageKey) -> Self {
        Self {
            id,
            page: page.to_string(),
            tags: Vec::new(),
            cookies: Vec::new(),
        }
    }

    fn add_tag(&mut self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    fn has_family(&self, family: CookieFamily) -> bool {
        self.cookies.iter().any(|c| family.owns(c))
    }
}

/// Correlates container script loads with first-party click cookies per page
///
/// Container loads and cookie discoveries for a page arrive independently
/// and in either order; both merge into the same [`GlobalSiteTagEntry`].
#[derive(Debug)]
pub struct SiteTagCorrelator {
    entries: IndexMap<PageKey, GlobalSiteTagEntry>,
    next_id: usize,
    scope: DomainScope,
    click_id: String,
    observation: ObservationScope,
    reset_cookies: bool,
}

impl SiteTagCorrelator {
    pub fn new(scope: DomainScope, click_id: &str, observation: ObservationScope) -> Self {
        Self {
            entries: IndexMap::new(),
            next_id: 1,
            scope,
            click_id: click_id.to_string(),
            observation,
            reset_cookies: false,
        }
    }

    /// Clear target-domain cookies whenever the designated tab starts loading a new URL
    pub fn with_reset_cookies(mut self, reset: bool) -> Self {
        self.reset_cookies = reset;
        self
    }

    pub fn click_id(&self) -> &str {
        &self.click_id
    }

    fn entry(&mut self, page: &PageKey) -> &mut GlobalSiteTagEntry {
        let id = self.next_id;
        let entry = self
            .entries
            .entry(page.clone())
            .or_insert_with(|| GlobalSiteTagEntry::new(id, page));
        if entry.id == id {
            self.next_id += 1;
        }
        entry
    }

    /// Ensures `url` has a (possibly empty) row
    pub fn register_page(&mut self, url: &str) {
        let page = PageKey::new(url);
        if !self.entries.contains_key(&page) {
            self.entry(&page);
        }
    }

    /// Handles a completed request; returns the entry if it changed
    pub fn observe_request(&mut self, call: &NetworkCall) -> Option<GlobalSiteTagEntry> {
        let accepted = match self.observation {
            ObservationScope::Manual => call
                .initiator
                .as_deref()
                .map(|i| self.scope.contains(i))
                .unwrap_or(false),
            ObservationScope::Tab(tab) => call.tab == tab,
        };
        if !accepted || !CONTAINER_HOST.is_match(&call.url) {
            return None;
        }

        let container = CONTAINER_ID
            .captures(&call.url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|id| !id.is_empty())?;

        let entry = self.entry(&PageKey::new(&call.page_url));
        if entry.add_tag(container) {
            tracing::debug!("Container {} loaded on {}", container, entry.page);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Handles a navigation update; returns the entry if it changed
    ///
    /// On the designated tab with cookie reset enabled, a `Loading` update
    /// for a new URL removes every target-domain cookie instead.
    pub async fn observe_navigation(
        &mut self,
        update: &TabUpdate,
        cookies: &dyn CookieStore,
    ) -> Option<GlobalSiteTagEntry> {
        match self.observation {
            ObservationScope::Manual => {
                if update.status != TabStatus::Complete {
                    return None;
                }
            }
            ObservationScope::Tab(tab) => {
                if update.tab != tab {
                    return None;
                }
                if self.reset_cookies && update.status == TabStatus::Loading && update.url_changed
                {
                    self.reset_domain_cookies(&update.url, cookies).await;
                    return None;
                }
            }
        }

        if !self.scope.contains(&update.url) {
            return None;
        }
        self.record_cookies(&update.url, cookies).await
    }

    fn cookie_domain<'a>(&'a self, url: &'a str) -> Option<&'a str> {
        if self.scope.is_any() {
            split_host(url).map(|(_, host)| host)
        } else {
            Some(self.scope.domain())
        }
    }

    async fn reset_domain_cookies(&self, url: &str, cookies: &dyn CookieStore) {
        let Some(domain) = self.cookie_domain(url) else {
            return;
        };

        let mut removed = 0;
        for cookie in cookies.cookies_for_domain(domain).await {
            let cookie_url = format!("https://{}{}", cookie.domain, cookie.path);
            if cookies.remove_cookie(&cookie_url, &cookie.name).await {
                removed += 1;
            }
        }
        tracing::debug!("Removed {} cookies for {}", removed, domain);
    }

    /// Adds click cookie descriptors for `url`'s page
    async fn record_cookies(
        &mut self,
        url: &str,
        cookies: &dyn CookieStore,
    ) -> Option<GlobalSiteTagEntry> {
        let domain = self.cookie_domain(url)?.to_string();
        let jar = cookies.cookies_for_domain(&domain).await;

        let click_id = self.click_id.clone();
        let entry = self.entry(&PageKey::new(url));
        let mut changed = false;

        for family in CookieFamily::ALL {
            if entry.has_family(family) {
                continue;
            }
            let found = jar.iter().find(|c| {
                c.name.contains(family.cookie_name()) && c.value.contains(click_id.as_str())
            });
            if let Some(cookie) = found {
                entry.cookies.push(cookie.descriptor());
                changed = true;
            }
        }

        changed.then(|| entry.clone())
    }

    pub fn get(&self, page: &PageKey) -> Option<&GlobalSiteTagEntry> {
        self.entries.get(page)
    }

    /// Entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = &GlobalSiteTagEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the site-tag report as CSV text
    pub fn export(&self) -> OutputResult<String> {
        render_table(self)
    }
}

fn joined(values: &[String]) -> String {
    if values.is_empty() {
        "None".to_string()
    } else {
        values.join("; ")
    }
}

impl ReportTable for SiteTagCorrelator {
    fn header(&self) -> &'static [&'static str] {
        SITE_TAG_REPORT_HEADER
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.entries()
            .map(|e| vec![e.page.clone(), joined(&e.tags), joined(&e.cookies)])
            .collect()
    }

    fn quote_all(&self) -> bool {
        false
    }
}
