//! Floodlight ID lookups against a mock reporting API

use reqwest::{Client, Url};
use tagwalk::tags::{FloodlightIdResolver, FloodlightQuery, HttpFloodlightResolver};
use tagwalk::ResolveError;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOOKUP_PATH: &str = "/userprofiles/4242/floodlightActivities";

fn query() -> FloodlightQuery {
    FloodlightQuery {
        advertiser: "8765".to_string(),
        activity: Some("purch0".to_string()),
        group: Some("sales0".to_string()),
        profile_id: "4242".to_string(),
    }
}

fn resolver(server: &MockServer, token: Option<&str>) -> HttpFloodlightResolver {
    let api_base = Url::parse(&format!("{}/", server.uri())).unwrap();
    HttpFloodlightResolver::new(Client::new(), api_base, token.map(str::to_string))
}

#[tokio::test]
async fn test_resolves_matching_activity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .and(query_param("floodlightConfigurationId", "8765"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"floodlightActivities": [
                {"id": "1", "tagString": "purch0", "floodlightActivityGroupTagString": "other"},
                {"id": 2, "tagString": "purch0", "floodlightActivityGroupTagString": "sales0"}
            ]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let id = resolver(&server, Some("secret"))
        .resolve(&query())
        .await
        .unwrap();
    assert_eq!(id.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_no_matching_activity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"kind": "list"}"#))
        .mount(&server)
        .await;

    let id = resolver(&server, None).resolve(&query()).await.unwrap();
    assert!(id.is_none());
}

#[tokio::test]
async fn test_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = resolver(&server, Some("expired")).resolve(&query()).await;
    assert!(matches!(result, Err(ResolveError::Status(403))));
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOOKUP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sign in</html>"))
        .mount(&server)
        .await;

    let result = resolver(&server, None).resolve(&query()).await;
    assert!(matches!(result, Err(ResolveError::Decode(_))));
}
