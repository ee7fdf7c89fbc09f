use crate::browser::{Browser, HeaderRule, RuleId};
use crate::url::UrlPatternSet;
use crate::UrlResult;
use reqwest::header::CACHE_CONTROL;

/// Browser registrations held for the lifetime of one site-tag session
///
/// Network and navigation events reach the correlator through the run's
/// event channel; the only registration living in the browser itself is the
/// optional no-cache rewrite for container script requests. Dropping the
/// session with [`teardown`](Self::teardown) removes everything at once.
#[derive(Debug)]
pub struct SiteTagListeners {
    no_cache_rule: Option<RuleId>,
}

impl SiteTagListeners {
    /// Registers listeners; with `disable_cache` every container script
    /// request is sent with `Cache-Control: no-cache`
    pub fn register(browser: &dyn Browser, disable_cache: bool) -> UrlResult<Self> {
        let no_cache_rule = if disable_cache {
            Some(browser.add_header_rule(HeaderRule {
                urls: UrlPatternSet::site_tag()?,
                name: CACHE_CONTROL.as_str().to_string(),
                value: "no-cache".to_string(),
            }))
        } else {
            None
        };

        Ok(Self { no_cache_rule })
    }

    pub fn no_cache_rule(&self) -> Option<RuleId> {
        self.no_cache_rule
    }

    /// Removes every registration
    pub fn teardown(self, browser: &dyn Browser) {
        if let Some(id) = self.no_cache_rule {
            if !browser.remove_header_rule(id) {
                tracing::debug!("Header rule {} was already removed", id);
            }
        }
        tracing::debug!("Site-tag listeners removed");
    }
}
