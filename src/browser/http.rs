//! JavaScript-free browser over `reqwest`
//!
//! A navigation fetches the page, re-serializes the
//! markup through `scraper` (so attribute quoting matches a rendered DOM) and
//! then requests the page's `script`, `img` and `iframe` sub-resources that
//! match the observed URL patterns. Each sub-resource request is reported as
//! a [`NetworkCall`]; registered header rules are applied before it is sent.
//!
//! # Event Order
//!
//! For every navigation the events are: `Loading`, one `RequestCompleted`
//! per observed sub-resource in document order, then `Complete`. A page
//! that fails to load still produces `Complete` with empty markup.

use super::{
    Browser, BrowserEvent, CookieJar, HeaderRule, NetworkCall, RuleId, TabId, TabStatus,
    TabUpdate,
};
use crate::url::UrlPatternSet;
use crate::{BrowserError, BrowserResult};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, RequestBuilder};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

/// Builds the HTTP client used for page and sub-resource loads
///
/// Cookies set by any response are stored in `cookies` and sent back on
/// later requests.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tagwalk::browser::{build_http_client, CookieJar};
///
/// let jar = Arc::new(CookieJar::new());
/// let client = build_http_client("tagwalk/1.0", &jar).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &str,
    cookies: &Arc<CookieJar>,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .cookie_provider(Arc::clone(cookies))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A loaded page
#[derive(Debug, Clone, Default)]
struct LoadedPage {
    url: String,
    markup: String,
}

struct Inner {
    client: Client,
    cookies: Arc<CookieJar>,
    observed: UrlPatternSet,
    events: UnboundedSender<BrowserEvent>,
    tabs: Mutex<HashMap<TabId, LoadedPage>>,
    rules: Mutex<Vec<(RuleId, HeaderRule)>>,
    next_rule: AtomicU64,
}

/// Browser implementation backed by plain HTTP requests
#[derive(Clone)]
pub struct HttpBrowser {
    inner: Arc<Inner>,
}

impl HttpBrowser {
    /// Creates a browser and the receiving end of its event stream
    ///
    /// `observed` selects which sub-resources are loaded and reported.
    /// `cookies` must be the jar `client` was built with.
    pub fn new(
        client: Client,
        cookies: Arc<CookieJar>,
        observed: UrlPatternSet,
    ) -> (Self, UnboundedReceiver<BrowserEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let browser = Self {
            inner: Arc::new(Inner {
                client,
                cookies,
                observed,
                events,
                tabs: Mutex::new(HashMap::new()),
                rules: Mutex::new(Vec::new()),
                next_rule: AtomicU64::new(1),
            }),
        };
        (browser, receiver)
    }

    pub fn cookies(&self) -> Arc<CookieJar> {
        Arc::clone(&self.inner.cookies)
    }
}

impl Inner {
    fn emit(&self, event: BrowserEvent) {
        // The receiver going away just means nobody is listening any more
        let _ = self.events.send(event);
    }

    fn tab_url(&self, tab: TabId) -> Option<String> {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tab)
            .map(|p| p.url.clone())
    }

    fn store_page(&self, tab: TabId, page: LoadedPage) {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tab, page);
    }

    /// Adds matching header rules to a request
    fn prepare(&self, url: &Url, mut request: RequestBuilder) -> RequestBuilder {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, rule) in rules.iter().filter(|(_, r)| r.urls.matches(url.as_str())) {
            request = request.header(rule.name.as_str(), rule.value.as_str());
        }
        request
    }

    async fn load(&self, tab: TabId, url: Url) {
        let page = match self.fetch_page(&url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Page load failed: {}", e);
                LoadedPage {
                    url: url.to_string(),
                    markup: String::new(),
                }
            }
        };

        let (markup, resources) = match Url::parse(&page.url) {
            Ok(base) => render(&page.markup, &base),
            Err(_) => (page.markup.clone(), Vec::new()),
        };

        self.store_page(
            tab,
            LoadedPage {
                url: page.url.clone(),
                markup,
            },
        );

        let initiator = Url::parse(&page.url)
            .ok()
            .map(|u| u.origin().ascii_serialization());

        for resource in resources {
            if !self.observed.matches(resource.as_str()) {
                continue;
            }

            let request = self.prepare(&resource, self.client.get(resource.clone()));
            match request.send().await {
                Ok(response) => {
                    self.emit(BrowserEvent::RequestCompleted(NetworkCall {
                        tab,
                        page_url: page.url.clone(),
                        initiator: initiator.clone(),
                        url: resource.to_string(),
                        status_code: response.status().as_u16(),
                    }));
                }
                Err(e) => tracing::debug!("Sub-resource {} failed: {}", resource, e),
            }
        }

        self.emit(BrowserEvent::TabUpdated(TabUpdate {
            tab,
            status: TabStatus::Complete,
            url: page.url,
            url_changed: false,
        }));
    }

    async fn fetch_page(&self, url: &Url) -> BrowserResult<LoadedPage> {
        let request = self.prepare(url, self.client.get(url.clone()));
        let response = request.send().await.map_err(|source| BrowserError::Http {
            url: url.to_string(),
            source,
        })?;

        let final_url = response.url().to_string();
        let markup = response.text().await.map_err(|source| BrowserError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(LoadedPage {
            url: final_url,
            markup,
        })
    }
}

/// Re-serializes `body` and lists its sub-resource URLs in document order
///
/// Kept synchronous: `scraper::Html` is not `Send` and must not live across
/// an await point.
fn render(body: &str, base: &Url) -> (String, Vec<Url>) {
    let document = Html::parse_document(body);
    let markup = document.root_element().html();

    let mut resources = Vec::new();
    if let Ok(selector) = Selector::parse("script[src], img[src], iframe[src]") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                match base.join(src.trim()) {
                    Ok(url) => resources.push(url),
                    Err(e) => tracing::debug!("Skipping sub-resource {}: {}", src, e),
                }
            }
        }
    }

    (markup, resources)
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn navigate(&self, tab: TabId, url: &str) -> BrowserResult<()> {
        let target = Url::parse(url).map_err(|e| BrowserError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let url_changed = self.inner.tab_url(tab).as_deref() != Some(target.as_str());
        self.inner.emit(BrowserEvent::TabUpdated(TabUpdate {
            tab,
            status: TabStatus::Loading,
            url: target.to_string(),
            url_changed,
        }));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.load(tab, target).await;
        });
        Ok(())
    }

    async fn current_url(&self, tab: TabId) -> BrowserResult<String> {
        self.inner.tab_url(tab).ok_or(BrowserError::NoPage(tab))
    }

    async fn page_markup(&self, tab: TabId) -> BrowserResult<String> {
        self.inner
            .tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tab)
            .map(|p| p.markup.clone())
            .ok_or(BrowserError::NoPage(tab))
    }

    fn add_header_rule(&self, rule: HeaderRule) -> RuleId {
        let id = self.inner.next_rule.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Adding header rule {} ({}: {})", id, rule.name, rule.value);
        self.inner
            .rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, rule));
        id
    }

    fn remove_header_rule(&self, id: RuleId) -> bool {
        let mut rules = self.inner.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let before = rules.len();
        rules.retain(|(rule_id, _)| *rule_id != id);
        rules.len() != before
    }
}
