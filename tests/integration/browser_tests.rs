//! HTTP browser tests against a mock site

use crate::common::{config, drain};
use std::sync::Arc;
use std::time::Duration;
use tagwalk::browser::{
    build_http_client, Browser, BrowserEvent, CookieJar, CookieStore, HeaderRule, HttpBrowser,
    NetworkCall, TabStatus,
};
use tagwalk::crawler::{Collaborators, Coordinator, RunEvent};
use tagwalk::tags::VendorKind;
use tagwalk::url::{PageKey, UrlPatternSet};
use tagwalk::BrowserError;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PIXEL_PATTERN: &str = "http://127.0.0.1/fls.doubleclick.net/*";
const PIXEL: &str = "/fls.doubleclick.net/activityi;src=8765;type=sales0;cat=purch0;ord=1?";

fn browser() -> (HttpBrowser, UnboundedReceiver<BrowserEvent>) {
    let jar = Arc::new(CookieJar::new());
    let client = build_http_client("tagwalk-test/1.0", &jar).unwrap();
    let observed = UrlPatternSet::parse_all(&[PIXEL_PATTERN]).unwrap();
    HttpBrowser::new(client, jar, observed)
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Collects events up to and including the next `Complete`
async fn until_complete(events: &mut UnboundedReceiver<BrowserEvent>) -> Vec<BrowserEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for page load")
            .expect("event stream closed");
        let complete =
            matches!(&event, BrowserEvent::TabUpdated(u) if u.status == TabStatus::Complete);
        seen.push(event);
        if complete {
            return seen;
        }
    }
}

fn calls(events: &[BrowserEvent]) -> Vec<&NetworkCall> {
    events
        .iter()
        .filter_map(|e| match e {
            BrowserEvent::RequestCompleted(call) => Some(call),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_navigation_reports_observed_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<html><body><img src="/logo.png"><img src="{}"></body></html>"#,
                    PIXEL
                ))
                .insert_header("set-cookie", "_gcl_dc=GCL.1.Test-9; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/fls.doubleclick.net/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (browser, mut events) = browser();
    let url = format!("{}/", server.uri());
    browser.navigate(1, &url).await.unwrap();
    let seen = until_complete(&mut events).await;

    match &seen[0] {
        BrowserEvent::TabUpdated(update) => {
            assert_eq!(update.status, TabStatus::Loading);
            assert!(update.url_changed);
            assert_eq!(update.url, url);
        }
        other => panic!("expected Loading first, got {:?}", other),
    }

    let calls = calls(&seen);
    assert_eq!(calls.len(), 1);
    assert!(calls[0].url.contains("activityi;src=8765"));
    assert_eq!(calls[0].page_url, url);
    assert_eq!(calls[0].initiator.as_deref(), Some(server.uri().as_str()));
    assert_eq!(calls[0].status_code, 200);

    let cookies = browser.cookies().cookies_for_domain("127.0.0.1").await;
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].descriptor(), "_gcl_dc=GCL.1.Test-9");
    assert_eq!(browser.current_url(1).await.unwrap(), url);
}

#[tokio::test]
async fn test_cookies_round_trip_and_expire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "_gcl_aw=GCL.1.Test-4; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logout"))
        .and(header("cookie", "_gcl_aw=GCL.1.Test-4"))
        .respond_with(ResponseTemplate::new(200).insert_header(
            "set-cookie",
            "_gcl_aw=deleted; Path=/; expires=Thu, 01-Jan-1970 00:00:01 GMT",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (browser, mut events) = browser();
    browser
        .navigate(1, &format!("{}/", server.uri()))
        .await
        .unwrap();
    until_complete(&mut events).await;
    assert_eq!(browser.cookies().len(), 1);

    browser
        .navigate(1, &format!("{}/logout", server.uri()))
        .await
        .unwrap();
    until_complete(&mut events).await;
    assert!(browser.cookies().is_empty());
}

#[tokio::test]
async fn test_markup_is_reserialized() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<a href='/about'>About</a>").await;

    let (browser, mut events) = browser();
    browser
        .navigate(1, &format!("{}/", server.uri()))
        .await
        .unwrap();
    until_complete(&mut events).await;

    let markup = browser.page_markup(1).await.unwrap();
    assert!(markup.contains(r#"href="/about""#));
}

#[tokio::test]
async fn test_header_rule_applied_until_removed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &format!(r#"<img src="{}">"#, PIXEL)).await;
    Mock::given(method("GET"))
        .and(path_regex("^/fls.doubleclick.net/"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (browser, mut events) = browser();
    let url = format!("{}/", server.uri());
    let rule = browser.add_header_rule(HeaderRule {
        urls: UrlPatternSet::parse_all(&[PIXEL_PATTERN]).unwrap(),
        name: "cache-control".to_string(),
        value: "no-cache".to_string(),
    });

    browser.navigate(1, &url).await.unwrap();
    let seen = until_complete(&mut events).await;
    assert_eq!(calls(&seen)[0].status_code, 200);

    assert!(browser.remove_header_rule(rule));
    assert!(!browser.remove_header_rule(rule));

    browser.navigate(1, &url).await.unwrap();
    let seen = until_complete(&mut events).await;
    assert!(matches!(&seen[0], BrowserEvent::TabUpdated(u) if !u.url_changed));
    assert_eq!(calls(&seen)[0].status_code, 404);
}

#[tokio::test]
async fn test_failed_load_still_completes() {
    let (browser, mut events) = browser();
    browser.navigate(1, "http://127.0.0.1:1/").await.unwrap();

    let seen = until_complete(&mut events).await;
    assert_eq!(seen.len(), 2);
    assert!(calls(&seen).is_empty());
    assert!(!browser.page_markup(1).await.unwrap().contains("href"));
}

#[tokio::test]
async fn test_navigate_rejects_invalid_url() {
    let (browser, _events) = browser();
    let result = browser.navigate(1, "not a url").await;
    assert!(matches!(result, Err(BrowserError::Navigation { .. })));
    assert!(matches!(
        browser.current_url(1).await,
        Err(BrowserError::NoPage(1))
    ));
}

#[tokio::test]
async fn test_crawl_over_http() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<p><a href='/page2'>Next</a></p>").await;
    mount_page(&server, "/page2", &format!(r#"<img src="{}">"#, PIXEL)).await;
    Mock::given(method("GET"))
        .and(path_regex("^/fls.doubleclick.net/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config(&format!(
        r#"
[crawler]
start-url = "{}/"
settle-time = 10

[tags]
monitor = ["{}"]

[site-tag]
click-id = "Test-3"
"#,
        server.uri(),
        PIXEL_PATTERN
    ));

    let (browser, events) = browser();
    let jar = browser.cookies();
    let (sink, mut run_events) = mpsc::unbounded_channel();
    let coordinator = Coordinator::new(
        &config,
        Collaborators {
            browser: Arc::new(browser),
            cookies: jar,
            events,
            resolver: None,
        },
    )
    .unwrap()
    .with_event_sink(sink);

    let report = coordinator.run().await;

    assert_eq!(report.statistics.pages_found, 2);
    assert_eq!(report.statistics.pages_visited, 2);

    let page = PageKey::new(&format!("{}/page2", server.uri()));
    let records: Vec<_> = report.tags.records_for(&page).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, Some(VendorKind::Floodlight));
    assert_eq!(records[0].fields.advertiser.as_deref(), Some("8765"));
    assert_eq!(records[0].calls[0].status_code, 200);

    let last = drain(&mut run_events).pop();
    assert!(matches!(last, Some(RunEvent::StatisticsUpdated(s)) if s.done));
}
