//! Host browser collaborator contracts
//!
//! The crawl never talks to a browser directly. It drives navigation through
//! [`Browser`], reads and clears cookies through [`CookieStore`], and learns
//! what happened from a stream of [`BrowserEvent`]s delivered on a channel.
//! Events are validated into these structured types at the boundary, so the
//! rest of the crate never handles loosely typed payloads.
//!
//! [`HttpBrowser`] is a JavaScript-free implementation over `reqwest`.

mod cookies;
mod http;

pub use cookies::{Cookie, CookieJar};
pub use http::{build_http_client, HttpBrowser};

use crate::url::UrlPatternSet;
use crate::BrowserResult;
use async_trait::async_trait;

/// Identifies a browser tab
pub type TabId = u32;

/// Identifies a registered header rule
pub type RuleId = u64;

/// A header added to every outgoing request whose URL matches `urls`
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub urls: UrlPatternSet,
    pub name: String,
    pub value: String,
}

/// A completed outgoing network request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCall {
    /// Tab the request originated from
    pub tab: TabId,

    /// URL of the page loaded in that tab when the request was made
    pub page_url: String,

    /// Origin that initiated the request, if known
    pub initiator: Option<String>,

    /// The request URL
    pub url: String,

    pub status_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

/// A navigation state change in a tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabUpdate {
    pub tab: TabId,
    pub status: TabStatus,

    /// The tab's current URL
    pub url: String,

    /// True if this update carries a new URL for the tab
    pub url_changed: bool,
}

/// Everything the host browser reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    RequestCompleted(NetworkCall),
    TabUpdated(TabUpdate),
}

/// Browser automation and request rewriting
#[async_trait]
pub trait Browser: Send + Sync {
    /// Starts navigating `tab` to `url`
    ///
    /// Returns once the navigation has been accepted. Progress is reported
    /// as [`TabUpdate`] events; a load that fails still completes the tab.
    async fn navigate(&self, tab: TabId, url: &str) -> BrowserResult<()>;

    /// The URL currently loaded in `tab`
    async fn current_url(&self, tab: TabId) -> BrowserResult<String>;

    /// The rendered markup of the page in `tab`
    async fn page_markup(&self, tab: TabId) -> BrowserResult<String>;

    /// Registers a header rewrite applied before requests are sent
    fn add_header_rule(&self, rule: HeaderRule) -> RuleId;

    /// Removes a header rule; returns false if it was not registered
    fn remove_header_rule(&self, id: RuleId) -> bool;
}

/// Access to the browser's cookie store
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// All cookies whose domain is `domain` or one of its subdomains
    async fn cookies_for_domain(&self, domain: &str) -> Vec<Cookie>;

    /// Removes the cookie called `name` that would be sent to `url`
    async fn remove_cookie(&self, url: &str, name: &str) -> bool;
}
