use std::sync::Arc;
use std::time::Duration;

use domain::{GET_CONFIGURATION_ROUTE, WebApi};
use gw_hierarchy::{
    ConfigurationAccessor, ConfigurationClient, ConfigurationSource, HierarchyCache, HierarchyError,
    SourceResolver,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENTERPRISE: &str = "0b7f6a52-0000-4000-8000-000000000001";
const SITE: &str = "0b7f6a52-0000-4000-8000-000000000002";
const AREA_B: &str = "0b7f6a52-0000-4000-8000-000000000003";
const AREA_A: &str = "0b7f6a52-0000-4000-8000-000000000004";
const CELL: &str = "0b7f6a52-0000-4000-8000-000000000005";
const CENTER: &str = "0b7f6a52-0000-4000-8000-000000000006";
const UNIT: &str = "0b7f6a52-0000-4000-8000-000000000007";

fn payload() -> String {
    serde_json::json!({
        "friendly_name": "Acme",
        "name": ENTERPRISE,
        "sites": [{
            "friendly_name": "North",
            "name": SITE,
            "areas": [
                { "friendly_name": "Tank1", "name": AREA_B },
                {
                    "friendly_name": "Mixing",
                    "name": AREA_A,
                    "workCenters": [{
                        "friendly_name": "Line",
                        "name": CENTER,
                        "workUnits": [{
                            "friendly_name": "Unit",
                            "name": UNIT,
                            "workCells": [{ "friendly_name": "Tank1", "name": CELL }]
                        }]
                    }]
                }
            ]
        }]
    })
    .to_string()
}

fn config_api(server: &MockServer) -> WebApi {
    WebApi::new("Config", server.uri())
        .with_url_prefix("/ignored")
        .with_route(GET_CONFIGURATION_ROUTE, "/config")
        .with_header("appKey", "k1")
}

fn client() -> Arc<dyn ConfigurationSource> {
    Arc::new(ConfigurationClient::new(Duration::from_secs(5)).expect("client"))
}

#[tokio::test]
async fn fetch_posts_empty_string_body_without_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config"))
        .and(header("appKey", "k1"))
        .and(body_json(""))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload()))
        .expect(1)
        .mount(&server)
        .await;

    let body = client().fetch(&config_api(&server)).await.expect("fetch");
    assert_eq!(body, payload());
}

#[tokio::test]
async fn fetch_reports_status_and_missing_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let err = client().fetch(&config_api(&server)).await.expect_err("status");
    assert!(matches!(err, HierarchyError::Status { status: 500, .. }));

    let no_route = WebApi::new("Plain", server.uri());
    let err = client().fetch(&no_route).await.expect_err("route");
    assert!(matches!(err, HierarchyError::NoConfigurationRoute(name) if name == "Plain"));
}

#[tokio::test]
async fn accessor_fetches_once_then_serves_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(HierarchyCache::new());
    let accessor = ConfigurationAccessor::new(cache.clone(), client(), vec![config_api(&server)]);

    let first = accessor.get().await.expect("hierarchy");
    let second = accessor.get().await.expect("hierarchy");
    assert_eq!(first.len(), 7);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cache.get().is_some());
}

#[tokio::test]
async fn refresh_reports_each_api() {
    let good = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload()))
        .mount(&good)
        .await;
    let bad = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&bad)
        .await;

    let accessor = ConfigurationAccessor::new(
        Arc::new(HierarchyCache::new()),
        client(),
        vec![
            config_api(&good),
            WebApi::new("Broken", bad.uri()).with_route(GET_CONFIGURATION_ROUTE, "/config"),
        ],
    );

    let report = accessor.refresh().await;
    assert_eq!(report.refreshed, vec!["Config".to_string()]);
    assert_eq!(report.failed, vec!["Broken".to_string()]);
    assert_eq!(report.node_count, 7);
}

#[tokio::test]
async fn resolver_prefers_first_name_path_match_then_fallbacks() {
    let cache = Arc::new(HierarchyCache::new());
    cache.update(&payload()).expect("update");
    let accessor = Arc::new(ConfigurationAccessor::new(cache, client(), Vec::new()));

    // "Acme.North.Mixing.Line.Unit.Tank1" 排在 "Acme.North.Tank1" 之前。
    let resolver = SourceResolver::new(accessor.clone(), SITE);
    assert_eq!(
        resolver.resolve("Tank1").await,
        format!("{ENTERPRISE}.{SITE}.{AREA_A}.{CENTER}.{UNIT}.{CELL}")
    );
    assert_eq!(resolver.resolve("Unknown").await, format!("{ENTERPRISE}.{SITE}"));

    let resolver = SourceResolver::new(accessor, "not-a-node");
    assert_eq!(resolver.resolve("Unknown").await, "not-a-node");
}

#[tokio::test]
async fn resolver_without_hierarchy_returns_fallback_id() {
    let accessor = Arc::new(ConfigurationAccessor::new(
        Arc::new(HierarchyCache::new()),
        client(),
        Vec::new(),
    ));
    let resolver = SourceResolver::new(accessor, "fallback-id");
    assert_eq!(resolver.resolve("Tank1").await, "fallback-id");
}

#[test]
fn failed_update_keeps_previous_hierarchy() {
    let cache = HierarchyCache::new();
    cache.update(&payload()).expect("update");
    assert!(matches!(cache.update(""), Err(HierarchyError::Validation(_))));
    assert_eq!(cache.get().expect("cached").len(), 7);
}
