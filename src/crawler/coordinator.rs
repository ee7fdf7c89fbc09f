//! Run coordinator - owns all per-run state and drives the crawl
//!
//! A [`Coordinator`] is built fresh for every run. It holds the frontier,
//! the tag tracker and the site-tag correlator, and reacts to three event
//! sources in a single loop:
//! - browser events (completed requests, tab updates)
//! - finished floodlight ID lookups
//! - the settle timer that paces navigation
//!
//! Every handler runs to completion before the next event is taken, so the
//! run state needs no locking.

use crate::browser::{Browser, BrowserEvent, CookieStore, NetworkCall, TabId, TabStatus, TabUpdate};
use crate::config::Config;
use crate::crawler::discoverer::LinkDiscoverer;
use crate::crawler::frontier::Frontier;
use crate::crawler::navigator::{Navigator, SettleTimer};
use crate::output::{OutputResult, Statistics};
use crate::sitetag::{
    generate_click_id, GlobalSiteTagEntry, ObservationScope, SiteTagCorrelator, SiteTagListeners,
};
use crate::tags::{
    Extraction, FloodlightIdResolver, FloodlightQuery, RecordRef, TagExtractor, TagRecord,
    TagTracker,
};
use crate::url::{construct_url, scrub_url, DomainScope, PageKey, UrlPatternSet};
use crate::{ConfigError, ResolveError, Result};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

/// Tab the crawl navigates
pub const DESIGNATED_TAB: TabId = 1;

/// How long finished runs wait for outstanding floodlight lookups
const LOOKUP_GRACE: Duration = Duration::from_secs(5);

/// Everything a run observes, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TagRecordAdded(TagRecord),

    /// A record changed after it was reported (floodlight ID resolved)
    TagRecordUpdated(TagRecord),

    SiteTagUpdated(GlobalSiteTagEntry),
    StatisticsUpdated(Statistics),
}

/// The host collaborators a run talks to
pub struct Collaborators {
    pub browser: Arc<dyn Browser>,
    pub cookies: Arc<dyn CookieStore>,

    /// Event stream produced by `browser`
    pub events: UnboundedReceiver<BrowserEvent>,

    /// Floodlight ID lookup service, if enrichment is wanted
    pub resolver: Option<Arc<dyn FloodlightIdResolver>>,
}

/// Stops a running crawl from outside
#[derive(Debug, Clone)]
pub struct RunHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl RunHandle {
    /// Requests the run to stop; the run finishes its current handler first
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}

/// What a finished run leaves behind
#[derive(Debug)]
pub struct RunReport {
    pub tags: TagTracker,
    pub site_tags: Option<SiteTagCorrelator>,
    pub statistics: Statistics,
}

impl RunReport {
    /// The tag report as CSV text
    pub fn tag_report(&self) -> OutputResult<String> {
        self.tags.export()
    }

    /// The site-tag report as CSV text, if verification was enabled
    pub fn site_tag_report(&self) -> Option<OutputResult<String>> {
        self.site_tags.as_ref().map(SiteTagCorrelator::export)
    }
}

struct SiteTagSession {
    correlator: SiteTagCorrelator,
    listeners: SiteTagListeners,
}

struct LookupResult {
    location: RecordRef,
    result: std::result::Result<Option<String>, ResolveError>,
}

/// Main run coordinator structure
pub struct Coordinator {
    frontier: Frontier,
    tracker: TagTracker,
    extractor: TagExtractor,
    monitored: UrlPatternSet,
    discoverer: Option<LinkDiscoverer>,
    site_tags: Option<SiteTagSession>,
    navigator: Navigator,
    cookies: Arc<dyn CookieStore>,
    events: UnboundedReceiver<BrowserEvent>,
    resolver: Option<Arc<dyn FloodlightIdResolver>>,
    lookups_tx: UnboundedSender<LookupResult>,
    lookups_rx: UnboundedReceiver<LookupResult>,
    pending_lookups: usize,
    outbound: Option<UnboundedSender<RunEvent>>,
    handle: RunHandle,
    stop: watch::Receiver<bool>,
    click_id: String,
    manual: bool,
    show_empty_pages: bool,
    running: bool,
    previous_page: Option<String>,
    settle: Option<SettleTimer>,
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// # Setup Steps
    ///
    /// 1. Derive the target domain and session click ID
    /// 2. Seed the frontier: the explicit URL list, or the starting URL with
    ///    click parameters and suffix applied
    /// 3. Build the extractor (unrestricted when a URL list is used)
    /// 4. Register site-tag listeners when verification is enabled
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let domain = config.domain();
        let discovery = config.discovery_enabled();
        let scope = DomainScope::new(&domain)?;
        let click_id = config
            .site_tag
            .click_id
            .clone()
            .unwrap_or_else(generate_click_id);

        let mut frontier = build_frontier(&config.crawler.exclude)?;
        if discovery {
            let start = construct_url(
                &scrub_url(&config.crawler.start_url),
                true,
                &click_id,
                &config.site_tag.click_source,
                &config.crawler.url_suffix,
            );
            frontier.found(&start);
        } else {
            frontier.seed(&config.crawler.urls);
        }

        let extractor_scope = if discovery {
            scope.clone()
        } else {
            DomainScope::any()
        };
        let extractor = TagExtractor::new(extractor_scope)
            .with_config_ids(config.tags.floodlight_config_ids.clone())
            .with_key_strategy(config.tags.record_key)
            .with_profile_id(config.tags.profile_id.clone());

        let monitored = match &config.tags.monitor {
            Some(patterns) => UrlPatternSet::parse_all(patterns.as_slice())?,
            None => UrlPatternSet::monitored()?,
        };

        let Collaborators {
            browser,
            cookies,
            events,
            resolver,
        } = collaborators;

        let manual = config.crawler.manual;
        let site_tags = if config.site_tag.enabled {
            let observation = if manual {
                ObservationScope::Manual
            } else {
                ObservationScope::Tab(DESIGNATED_TAB)
            };
            Some(SiteTagSession {
                correlator: SiteTagCorrelator::new(scope.clone(), &click_id, observation)
                    .with_reset_cookies(config.site_tag.reset_cookies),
                listeners: SiteTagListeners::register(
                    browser.as_ref(),
                    config.site_tag.disable_cache,
                )?,
            })
        } else {
            None
        };

        let discoverer = (discovery && !manual).then(|| LinkDiscoverer::new(scope));
        let navigator = Navigator::new(browser, DESIGNATED_TAB, config.crawler.settle_duration());

        let (lookups_tx, lookups_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop) = watch::channel(false);

        tracing::info!(
            "Run configured for {} (click ID {}, {} pages seeded)",
            if domain.is_empty() { "any domain" } else { domain.as_str() },
            click_id,
            frontier.found_count()
        );

        Ok(Self {
            frontier,
            tracker: TagTracker::new(),
            extractor,
            monitored,
            discoverer,
            site_tags,
            navigator,
            cookies,
            events,
            resolver,
            lookups_tx,
            lookups_rx,
            pending_lookups: 0,
            outbound: None,
            handle: RunHandle {
                stop: Arc::new(stop_tx),
            },
            stop,
            click_id,
            manual,
            show_empty_pages: config.tags.show_empty_pages,
            running: false,
            previous_page: None,
            settle: None,
        })
    }

    /// Sends every [`RunEvent`] to `sink` as it happens
    pub fn with_event_sink(mut self, sink: UnboundedSender<RunEvent>) -> Self {
        self.outbound = Some(sink);
        self
    }

    /// A handle that can stop this run
    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    /// The session click ID matched against click cookies
    pub fn click_id(&self) -> &str {
        &self.click_id
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Runs until the frontier is exhausted (active mode), the browser event
    /// stream closes, or the run is stopped
    pub async fn run(mut self) -> RunReport {
        tracing::info!(
            "Starting {} run",
            if self.manual { "passive" } else { "active" }
        );
        self.running = !*self.stop.borrow();

        if self.running && !self.manual {
            self.advance().await;
        }

        while self.running {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::info!("Browser event stream closed");
                        self.running = false;
                    }
                },
                Some(lookup) = self.lookups_rx.recv() => self.apply_lookup(lookup),
                _ = wait_settle(&mut self.settle) => {
                    self.settle = None;
                    self.advance().await;
                }
                Ok(()) = self.stop.changed() => {
                    if *self.stop.borrow() {
                        tracing::info!("Stop requested");
                        self.running = false;
                    }
                }
            }
        }

        self.finish().await
    }

    /// Navigates to the next found page, or ends an active run
    async fn advance(&mut self) {
        if !self.running {
            return;
        }

        let Some(entry) = self.frontier.next_page() else {
            tracing::info!("Frontier exhausted, run complete");
            self.running = false;
            return;
        };

        if let Some(session) = self.site_tags.as_mut() {
            session.correlator.register_page(&entry.url);
        }

        if let Err(e) = self.navigator.visit(&entry.url).await {
            tracing::warn!("Navigation to {} failed: {}", entry.url, e);
            self.settle = Some(self.navigator.settle_timer());
        }
    }

    async fn handle_event(&mut self, event: BrowserEvent) {
        match event {
            BrowserEvent::RequestCompleted(call) => self.on_request(call),
            BrowserEvent::TabUpdated(update) => self.on_tab_update(update).await,
        }
    }

    fn on_request(&mut self, call: NetworkCall) {
        let entry = self
            .site_tags
            .as_mut()
            .and_then(|s| s.correlator.observe_request(&call));
        if let Some(entry) = entry {
            self.emit(RunEvent::SiteTagUpdated(entry));
        }

        let observed = self.manual || call.tab == self.navigator.tab();
        if !observed || !self.monitored.matches(&call.url) {
            return;
        }

        let extraction =
            self.extractor
                .extract(&mut self.tracker, &call.page_url, &call.url, call.status_code);

        match extraction {
            Extraction::Created(location) => {
                let Some(record) = self.tracker.get(&location).cloned() else {
                    return;
                };
                let query = self.extractor.lookup_for(&record);
                tracing::debug!("New {:?} record on {}", record.kind, record.page);
                self.emit(RunEvent::TagRecordAdded(record));
                if let Some(query) = query {
                    self.spawn_lookup(location, query);
                }
            }
            Extraction::Appended(location) => {
                tracing::debug!("Appended call to record {} on {}", location.key, location.page);
            }
            other => tracing::debug!("Call {} not recorded: {:?}", call.url, other),
        }
    }

    async fn on_tab_update(&mut self, update: TabUpdate) {
        let entry = match self.site_tags.as_mut() {
            Some(session) => {
                session
                    .correlator
                    .observe_navigation(&update, self.cookies.as_ref())
                    .await
            }
            None => None,
        };
        if let Some(entry) = entry {
            self.emit(RunEvent::SiteTagUpdated(entry));
        }

        let designated = update.tab == self.navigator.tab();
        if !self.running || update.status != TabStatus::Complete || !(self.manual || designated) {
            return;
        }
        self.page_completed(&update.url).await;
    }

    /// Handles the designated tab finishing a page load
    ///
    /// Closes out the previous page, scrapes links from this one and arms
    /// the settle timer before the next visit.
    async fn page_completed(&mut self, url: &str) {
        self.finish_page();
        self.previous_page = Some(url.to_string());

        if !self.manual {
            if let Some(discoverer) = &self.discoverer {
                match self.navigator.markup().await {
                    Ok(markup) => {
                        let added = discoverer
                            .discover(&markup, url)
                            .iter()
                            .filter(|link| self.frontier.found(link))
                            .count();
                        tracing::debug!("Found {} new pages on {}", added, url);
                    }
                    Err(e) => tracing::warn!("Could not read markup of {}: {}", url, e),
                }
            }
            self.settle = Some(self.navigator.settle_timer());
        }

        let stats = self.statistics(false);
        self.emit(RunEvent::StatisticsUpdated(stats));
    }

    /// Adds the placeholder row for the previous page if it produced no tags
    fn finish_page(&mut self) {
        let Some(page) = self.previous_page.take() else {
            return;
        };
        if !self.show_empty_pages {
            return;
        }

        let placeholder = self
            .tracker
            .insert_placeholder(&PageKey::new(&page))
            .and_then(|location| self.tracker.get(&location).cloned());
        if let Some(record) = placeholder {
            tracing::debug!("No tags on {}", record.page);
            self.emit(RunEvent::TagRecordAdded(record));
        }
    }

    fn spawn_lookup(&mut self, location: RecordRef, query: FloodlightQuery) {
        let Some(resolver) = self.resolver.clone() else {
            return;
        };

        let results = self.lookups_tx.clone();
        self.pending_lookups += 1;
        tokio::spawn(async move {
            let result = resolver.resolve(&query).await;
            let _ = results.send(LookupResult { location, result });
        });
    }

    fn apply_lookup(&mut self, lookup: LookupResult) {
        self.pending_lookups = self.pending_lookups.saturating_sub(1);

        let id = match lookup.result {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!("No floodlight activity matched record {}", lookup.location.key);
                return;
            }
            Err(e) => {
                tracing::warn!("Floodlight ID lookup failed: {}", e);
                return;
            }
        };

        let updated = match self.tracker.get_mut(&lookup.location) {
            Some(record) if record.floodlight_id.is_none() => {
                record.floodlight_id = Some(id);
                Some(record.clone())
            }
            _ => None,
        };
        if let Some(record) = updated {
            self.emit(RunEvent::TagRecordUpdated(record));
        }
    }

    fn statistics(&self, done: bool) -> Statistics {
        Statistics {
            pages_found: self.frontier.found_count(),
            pages_visited: self.frontier.visited_count(),
            tags_found: self.tracker.tag_count(),
            done,
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(sink) = &self.outbound {
            // A dropped sink only means nobody is watching
            let _ = sink.send(event);
        }
    }

    /// Drains queued work, closes the last page and tears down listeners
    async fn finish(mut self) -> RunReport {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event).await;
        }

        if self.pending_lookups > 0 {
            let deadline = tokio::time::sleep(LOOKUP_GRACE);
            tokio::pin!(deadline);
            while self.pending_lookups > 0 {
                tokio::select! {
                    Some(lookup) = self.lookups_rx.recv() => self.apply_lookup(lookup),
                    _ = &mut deadline => {
                        tracing::warn!(
                            "{} floodlight lookups still pending at shutdown",
                            self.pending_lookups
                        );
                        break;
                    }
                }
            }
        }

        self.finish_page();
        let statistics = self.statistics(true);
        self.emit(RunEvent::StatisticsUpdated(statistics));

        let browser = Arc::clone(self.navigator.browser());
        let site_tags = self.site_tags.take().map(|session| {
            session.listeners.teardown(browser.as_ref());
            session.correlator
        });

        tracing::info!(
            "Run finished: {} pages visited, {} tags found",
            statistics.pages_visited,
            statistics.tags_found
        );

        RunReport {
            tags: self.tracker,
            site_tags,
            statistics,
        }
    }
}

/// Builds the frontier, rejecting URLs that match any exclude pattern
fn build_frontier(exclude: &[String]) -> Result<Frontier> {
    if exclude.is_empty() {
        return Ok(Frontier::new());
    }

    let patterns = exclude
        .iter()
        .map(|p| Regex::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

    Ok(Frontier::with_filter(Box::new(move |url| {
        !patterns.iter().any(|p| p.is_match(url))
    })))
}

async fn wait_settle(timer: &mut Option<SettleTimer>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
