//! Shared fixtures for integration tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tagwalk::browser::{
    Browser, BrowserEvent, Cookie, CookieJar, HeaderRule, NetworkCall, RuleId, TabId, TabStatus,
    TabUpdate,
};
use tagwalk::config::{parse_config, Config};
use tagwalk::crawler::{Collaborators, RunEvent};
use tagwalk::tags::FloodlightIdResolver;
use tagwalk::url::scrub_url;
use tagwalk::{BrowserError, BrowserResult};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Default)]
struct ScriptedPage {
    markup: String,
    calls: Vec<String>,
    cookies: Vec<Cookie>,
}

/// In-memory browser that replays a scripted site
///
/// Every navigation synchronously emits `Loading`, one `RequestCompleted`
/// per scripted call, then `Complete`. Cookies scripted for a page are put
/// into the jar while it loads. Unknown pages complete with empty markup.
pub struct ScriptedBrowser {
    pages: HashMap<String, ScriptedPage>,
    jar: Arc<CookieJar>,
    events: UnboundedSender<BrowserEvent>,
    current: Mutex<HashMap<TabId, String>>,
    visits: Mutex<Vec<String>>,
    rules: Mutex<Vec<RuleId>>,
    rules_added: Mutex<usize>,
}

impl ScriptedBrowser {
    pub fn new() -> (Self, UnboundedReceiver<BrowserEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let browser = Self {
            pages: HashMap::new(),
            jar: Arc::new(CookieJar::new()),
            events,
            current: Mutex::new(HashMap::new()),
            visits: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            rules_added: Mutex::new(0),
        };
        (browser, receiver)
    }

    /// Scripts a page; `url` is matched after scrubbing
    pub fn page(mut self, url: &str, markup: &str, calls: &[&str]) -> Self {
        let page = self.pages.entry(scrub_url(url)).or_default();
        page.markup = markup.to_string();
        page.calls = calls.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Sets a cookie whenever `url` loads
    pub fn cookie(mut self, url: &str, cookie: Cookie) -> Self {
        self.pages
            .entry(scrub_url(url))
            .or_default()
            .cookies
            .push(cookie);
        self
    }

    pub fn jar(&self) -> Arc<CookieJar> {
        Arc::clone(&self.jar)
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn active_rules(&self) -> usize {
        self.rules.lock().unwrap().len()
    }

    pub fn rules_added(&self) -> usize {
        *self.rules_added.lock().unwrap()
    }

    fn emit(&self, event: BrowserEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn navigate(&self, tab: TabId, url: &str) -> BrowserResult<()> {
        if !url.starts_with("http") {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "unsupported scheme".to_string(),
            });
        }

        self.visits.lock().unwrap().push(url.to_string());
        let previous = self.current.lock().unwrap().insert(tab, url.to_string());
        self.emit(BrowserEvent::TabUpdated(TabUpdate {
            tab,
            status: TabStatus::Loading,
            url: url.to_string(),
            url_changed: previous.as_deref() != Some(url),
        }));

        if let Some(page) = self.pages.get(&scrub_url(url)) {
            for cookie in &page.cookies {
                self.jar.insert(cookie.clone());
            }
            for call in &page.calls {
                self.emit(BrowserEvent::RequestCompleted(NetworkCall {
                    tab,
                    page_url: url.to_string(),
                    initiator: Some(scrub_url(url)),
                    url: call.to_string(),
                    status_code: 200,
                }));
            }
        }

        self.emit(BrowserEvent::TabUpdated(TabUpdate {
            tab,
            status: TabStatus::Complete,
            url: url.to_string(),
            url_changed: false,
        }));
        Ok(())
    }

    async fn current_url(&self, tab: TabId) -> BrowserResult<String> {
        self.current
            .lock()
            .unwrap()
            .get(&tab)
            .cloned()
            .ok_or(BrowserError::NoPage(tab))
    }

    async fn page_markup(&self, tab: TabId) -> BrowserResult<String> {
        let url = self.current_url(tab).await?;
        Ok(self
            .pages
            .get(&scrub_url(&url))
            .map(|p| p.markup.clone())
            .unwrap_or_default())
    }

    fn add_header_rule(&self, _rule: HeaderRule) -> RuleId {
        let mut added = self.rules_added.lock().unwrap();
        *added += 1;
        let id = *added as RuleId;
        self.rules.lock().unwrap().push(id);
        id
    }

    fn remove_header_rule(&self, id: RuleId) -> bool {
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|r| *r != id);
        rules.len() != before
    }
}

/// Builds collaborators around a scripted browser
pub fn collaborators(
    browser: &Arc<ScriptedBrowser>,
    events: UnboundedReceiver<BrowserEvent>,
    resolver: Option<Arc<dyn FloodlightIdResolver>>,
) -> Collaborators {
    Collaborators {
        browser: browser.clone(),
        cookies: browser.jar(),
        events,
        resolver,
    }
}

/// Parses a test configuration, panicking on error
pub fn config(toml: &str) -> Config {
    parse_config(toml).expect("test config must be valid")
}

/// Takes every event already sent on `events`
pub fn drain(events: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub const FLOODLIGHT_PING: &str =
    "https://8765.fls.doubleclick.net/activityi;src=8765;type=sales0;cat=purch0;u1=blue;ord=42;gtm=2od1?";
