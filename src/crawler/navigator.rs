//! Page navigator: drives the browser and paces visits

use crate::browser::{Browser, TabId};
use crate::BrowserResult;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Sleep;

/// A pending settle delay
pub type SettleTimer = Pin<Box<Sleep>>;

/// Sends the designated tab to each page and times the settle delay
///
/// The settle delay is static: after a page completes, the crawl waits the
/// full duration so the page's own tracking calls can fire before moving on.
#[derive(Clone)]
pub struct Navigator {
    browser: Arc<dyn Browser>,
    tab: TabId,
    settle: Duration,
}

impl Navigator {
    pub fn new(browser: Arc<dyn Browser>, tab: TabId, settle: Duration) -> Self {
        Self {
            browser,
            tab,
            settle,
        }
    }

    /// Instructs the browser to load `url` in the designated tab
    pub async fn visit(&self, url: &str) -> BrowserResult<()> {
        tracing::info!("Visit: {}", url);
        self.browser.navigate(self.tab, url).await
    }

    /// Starts a new settle delay
    pub fn settle_timer(&self) -> SettleTimer {
        Box::pin(tokio::time::sleep(self.settle))
    }

    pub async fn markup(&self) -> BrowserResult<String> {
        self.browser.page_markup(self.tab).await
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }
}
