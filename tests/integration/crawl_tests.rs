//! End-to-end coordinator tests against a scripted browser

use crate::common::{collaborators, config, drain, ScriptedBrowser, FLOODLIGHT_PING};
use async_trait::async_trait;
use std::sync::Arc;
use tagwalk::browser::{Browser, Cookie};
use tagwalk::crawler::{Coordinator, RunEvent};
use tagwalk::output::{write_report, SITE_TAG_REPORT, TAG_REPORT};
use tagwalk::tags::{FloodlightIdResolver, FloodlightQuery, VendorKind, NO_TAGS_DETECTED};
use tagwalk::url::PageKey;
use tagwalk::ResolveError;
use tokio::sync::mpsc;

const BASE: &str = r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 10
"#;

#[tokio::test]
async fn test_url_list_visits_each_page_once() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser);
    let config = config(
        r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 10
urls = ["https://www.example.com/a", "https://www.example.com/b", "https://www.example.com/a/"]
"#,
    );

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;

    assert_eq!(
        browser.visits(),
        vec!["https://www.example.com/a", "https://www.example.com/b"]
    );
    assert_eq!(report.statistics.pages_found, 2);
    assert_eq!(report.statistics.pages_visited, 2);
    assert!(report.statistics.done);
}

#[tokio::test]
async fn test_discovery_follows_in_scope_links() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(
        browser
            .page(
                "https://www.example.com/",
                r#"<a href="/shop">Shop</a>
                   <a href="https://www.example.com/about/">About</a>
                   <a href="https://partner.org/x">Partner</a>
                   <a href="/shop/?sort=price">Sorted</a>
                   <a href="/brochure.pdf">Brochure</a>
                   <a href="mailto:hello@example.com">Mail</a>"#,
                &[],
            )
            .page(
                "https://www.example.com/shop",
                r#"<a href="/">Home</a><a href="/cart">Cart</a>"#,
                &[],
            ),
    );
    let config = config(
        r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 10

[site-tag]
click-id = "Test-7"
"#,
    );

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;

    assert_eq!(
        browser.visits(),
        vec![
            "https://www.example.com?gclid=Test-7&gclsrc=aw.ds",
            "https://www.example.com/shop",
            "https://www.example.com/about",
            "https://www.example.com/cart",
        ]
    );
    assert_eq!(report.statistics.pages_visited, 4);
    assert_eq!(report.statistics.pages_pending(), 0);
}

#[tokio::test]
async fn test_exclude_patterns_are_never_visited() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page(
        "https://www.example.com/",
        r#"<a href="/account/logout">Logout</a><a href="/faq">FAQ</a>"#,
        &[],
    ));
    let config = config(
        r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 10
exclude = ["logout"]

[site-tag]
click-id = "Test-1"
"#,
    );

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None)).unwrap();
    coordinator.run().await;

    let visits = browser.visits();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[1], "https://www.example.com/faq");
}

#[tokio::test]
async fn test_tags_recorded_per_page() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page(
        "https://www.example.com/",
        "",
        &[
            FLOODLIGHT_PING,
            "https://www.google-analytics.com/collect?v=1&t=pageview&tid=UA-5-1",
            "https://cdn.example.com/app.js",
            "https://ad.doubleclick.net/activity;dc_pre=CK1;src=8765;type=a;cat=b",
        ],
    ));
    let (sink, mut run_events) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(&config(BASE), collaborators(&browser, events, None))
        .unwrap()
        .with_event_sink(sink);
    let report = coordinator.run().await;

    let page = PageKey::new("https://www.example.com/");
    let records: Vec<_> = report.tags.records_for(&page).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, Some(VendorKind::Floodlight));
    assert_eq!(records[0].fields.advertiser.as_deref(), Some("8765"));
    assert_eq!(records[0].first_call(), Some(FLOODLIGHT_PING));
    assert_eq!(records[1].kind, Some(VendorKind::Analytics));
    assert_eq!(report.statistics.tags_found, 2);

    let added = drain(&mut run_events)
        .into_iter()
        .filter(|e| matches!(e, RunEvent::TagRecordAdded(_)))
        .count();
    assert_eq!(added, 2);
}

#[tokio::test]
async fn test_repeated_calls_make_separate_records() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page(
        "https://www.example.com/",
        "",
        &[FLOODLIGHT_PING, FLOODLIGHT_PING],
    ));

    let coordinator =
        Coordinator::new(&config(BASE), collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;
    assert_eq!(report.tags.counter(), 2);

    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page(
        "https://www.example.com/",
        "",
        &[FLOODLIGHT_PING, FLOODLIGHT_PING],
    ));
    let logical = config(&format!("{}\n[tags]\nrecord-key = \"logical\"\n", BASE));

    let coordinator = Coordinator::new(&logical, collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;
    assert_eq!(report.tags.counter(), 1);
    assert_eq!(report.tags.records().next().unwrap().calls.len(), 2);
}

#[tokio::test]
async fn test_show_empty_pages_adds_placeholder() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(
        browser
            .page(
                "https://www.example.com/",
                r#"<a href="/empty">Empty</a>"#,
                &[FLOODLIGHT_PING],
            )
            .page("https://www.example.com/empty", "", &[]),
    );
    let config = config(&format!("{}\n[tags]\nshow-empty-pages = true\n", BASE));

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;

    assert_eq!(report.tags.page_count(), 2);
    assert_eq!(report.tags.counter(), 2);
    assert_eq!(report.statistics.tags_found, 1);

    let placeholder = report
        .tags
        .records_for(&PageKey::new("https://www.example.com/empty"))
        .next()
        .unwrap();
    assert!(placeholder.is_placeholder());

    let csv = report.tag_report().unwrap();
    assert!(csv.contains(NO_TAGS_DETECTED));
    assert_eq!(csv.lines().count(), 3);
}

#[tokio::test]
async fn test_stop_before_run() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser);

    let coordinator =
        Coordinator::new(&config(BASE), collaborators(&browser, events, None)).unwrap();
    coordinator.handle().stop();
    let report = coordinator.run().await;

    assert!(browser.visits().is_empty());
    assert_eq!(report.statistics.pages_visited, 0);
    assert!(report.statistics.done);
}

#[tokio::test]
async fn test_stop_during_settle() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page(
        "https://www.example.com/",
        r#"<a href="/a">A</a><a href="/b">B</a>"#,
        &[],
    ));
    let config = config(
        r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 60000
"#,
    );
    let (sink, mut run_events) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None))
        .unwrap()
        .with_event_sink(sink);
    let handle = coordinator.handle();
    let run = tokio::spawn(coordinator.run());

    loop {
        match run_events.recv().await {
            Some(RunEvent::StatisticsUpdated(_)) => break,
            Some(_) => continue,
            None => panic!("run ended before the first page completed"),
        }
    }
    handle.stop();

    let report = run.await.unwrap();
    assert_eq!(browser.visits().len(), 1);
    assert_eq!(report.statistics.pages_found, 3);
    assert_eq!(report.statistics.pages_visited, 1);
    assert_eq!(report.statistics.pages_pending(), 2);
}

#[tokio::test]
async fn test_passive_mode_only_listens() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page(
        "https://www.example.com/shop",
        r#"<a href="/cart">Cart</a>"#,
        &[FLOODLIGHT_PING],
    ));
    let config = config(&format!("{}manual = true\n", BASE));
    let (sink, mut run_events) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None))
        .unwrap()
        .with_event_sink(sink);
    let handle = coordinator.handle();
    let run = tokio::spawn(coordinator.run());

    // An operator drives a different tab
    browser
        .navigate(2, "https://www.example.com/shop")
        .await
        .unwrap();
    loop {
        match run_events.recv().await {
            Some(RunEvent::StatisticsUpdated(_)) => break,
            Some(_) => continue,
            None => panic!("run ended before the page completed"),
        }
    }
    handle.stop();

    let report = run.await.unwrap();
    assert_eq!(browser.visits(), vec!["https://www.example.com/shop"]);
    assert_eq!(report.statistics.pages_found, 1);
    assert_eq!(report.statistics.pages_visited, 0);

    let records: Vec<_> = report
        .tags
        .records_for(&PageKey::new("https://www.example.com/shop"))
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, Some(VendorKind::Floodlight));
}

#[tokio::test]
async fn test_site_tag_correlation() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(
        browser
            .page(
                "https://www.example.com/",
                r#"<a href="/plain">Plain</a>"#,
                &["https://www.googletagmanager.com/gtag/js?id=DC-ABC"],
            )
            .cookie(
                "https://www.example.com/",
                Cookie::new("_gcl_dc", "GCL.1.Test-7", "example.com"),
            ),
    );
    let config = config(
        r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 10

[site-tag]
enabled = true
click-id = "Test-7"
"#,
    );
    let (sink, mut run_events) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None))
        .unwrap()
        .with_event_sink(sink);
    assert_eq!(browser.active_rules(), 1);
    let report = coordinator.run().await;

    assert_eq!(browser.rules_added(), 1);
    assert_eq!(browser.active_rules(), 0);

    let site_tags = report.site_tags.as_ref().unwrap();
    let entries: Vec<_> = site_tags.entries().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].page, "https://www.example.com");
    assert_eq!(entries[0].tags, vec!["DC-ABC"]);
    assert_eq!(entries[0].cookies, vec!["_gcl_dc=GCL.1.Test-7"]);
    assert_eq!(entries[1].page, "https://www.example.com/plain");
    assert!(entries[1].tags.is_empty());

    assert!(drain(&mut run_events)
        .iter()
        .any(|e| matches!(e, RunEvent::SiteTagUpdated(entry) if entry.tags == ["DC-ABC"])));

    let csv = report.site_tag_report().unwrap().unwrap();
    assert_eq!(
        csv,
        "URL,AccountIDs,Cookies\r\nhttps://www.example.com,DC-ABC,_gcl_dc=GCL.1.Test-7\r\n\
         https://www.example.com/plain,None,_gcl_dc=GCL.1.Test-7\r\n"
    );
}

#[tokio::test]
async fn test_site_tag_disabled_registers_nothing() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser);

    let coordinator =
        Coordinator::new(&config(BASE), collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;

    assert_eq!(browser.rules_added(), 0);
    assert!(report.site_tags.is_none());
    assert!(report.site_tag_report().is_none());
}

struct FixedResolver(Option<&'static str>);

#[async_trait]
impl FloodlightIdResolver for FixedResolver {
    async fn resolve(&self, query: &FloodlightQuery) -> Result<Option<String>, ResolveError> {
        assert_eq!(query.advertiser, "8765");
        assert_eq!(query.profile_id, "4242");
        Ok(self.0.map(str::to_string))
    }
}

#[tokio::test]
async fn test_floodlight_id_enrichment() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page("https://www.example.com/", "", &[FLOODLIGHT_PING]));
    let config = config(&format!("{}\n[tags]\nprofile-id = \"4242\"\n", BASE));
    let resolver: Arc<dyn FloodlightIdResolver> = Arc::new(FixedResolver(Some("555")));
    let (sink, mut run_events) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, Some(resolver)))
        .unwrap()
        .with_event_sink(sink);
    let report = coordinator.run().await;

    let record = report.tags.records().next().unwrap();
    assert_eq!(record.floodlight_id.as_deref(), Some("555"));

    let events = drain(&mut run_events);
    let added = events
        .iter()
        .position(|e| matches!(e, RunEvent::TagRecordAdded(r) if r.floodlight_id.is_none()))
        .unwrap();
    let updated = events
        .iter()
        .position(|e| matches!(e, RunEvent::TagRecordUpdated(r) if r.floodlight_id.as_deref() == Some("555")))
        .unwrap();
    assert!(added < updated);
}

#[tokio::test]
async fn test_enrichment_without_match_leaves_id_unset() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page("https://www.example.com/", "", &[FLOODLIGHT_PING]));
    let config = config(&format!("{}\n[tags]\nprofile-id = \"4242\"\n", BASE));
    let resolver: Arc<dyn FloodlightIdResolver> = Arc::new(FixedResolver(None));

    let coordinator =
        Coordinator::new(&config, collaborators(&browser, events, Some(resolver))).unwrap();
    let report = coordinator.run().await;

    assert!(report.tags.records().next().unwrap().floodlight_id.is_none());
}

#[tokio::test]
async fn test_reports_written_to_output_directory() {
    let (browser, events) = ScriptedBrowser::new();
    let browser = Arc::new(browser.page("https://www.example.com/", "", &[FLOODLIGHT_PING]));
    let config = config(
        r#"
[crawler]
start-url = "https://www.example.com/"
settle-time = 10

[site-tag]
enabled = true
"#,
    );

    let coordinator = Coordinator::new(&config, collaborators(&browser, events, None)).unwrap();
    let report = coordinator.run().await;

    let dir = tempfile::tempdir().unwrap();
    let at = chrono::Local::now();
    let tags = write_report(
        dir.path(),
        &config.domain(),
        TAG_REPORT,
        &at,
        &report.tag_report().unwrap(),
    )
    .unwrap();
    let site_tags = write_report(
        dir.path(),
        &config.domain(),
        SITE_TAG_REPORT,
        &at,
        &report.site_tag_report().unwrap().unwrap(),
    )
    .unwrap();

    let name = tags.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("example.com-doubleclick-floodlight-report-"));
    assert!(name.ends_with(".csv"));
    assert!(std::fs::read_to_string(&tags).unwrap().contains("\"8765\""));
    assert!(std::fs::read_to_string(&site_tags)
        .unwrap()
        .starts_with("URL,AccountIDs,Cookies"));
}
