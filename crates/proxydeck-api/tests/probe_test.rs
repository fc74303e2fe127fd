// Integration tests for `ProviderProbe` using wiremock.
#![allow(clippy::unwrap_used)]

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use proxydeck_api::ProviderProbe;
use proxydeck_core::{ApiKey, ConnectionTester};

async fn setup() -> (MockServer, ProviderProbe) {
    let server = MockServer::start().await;
    (server, ProviderProbe::with_client(reqwest::Client::new()))
}

#[tokio::test]
async fn test_falls_back_to_v1_models() {
    let (server, probe) = setup().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("Authorization", "Bearer sk-good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "a" }, { "id": "b" }, { "id": "c" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = probe.probe(&format!("{}/", server.uri()), &ApiKey::new("sk-good")).await;

    assert!(result.success, "unexpected failure: {}", result.message);
    assert_eq!(result.models_found, Some(3));
    assert!(result.latency_ms.is_some());
}

#[tokio::test]
async fn test_auth_rejection_stops_probing() {
    let (server, probe) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/v1/models"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = probe
        .probe(&format!("{}/v1", server.uri()), &ApiKey::new("sk-bad"))
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Authentication failed - check your API key");
}

#[tokio::test]
async fn test_not_found_everywhere() {
    let (server, probe) = setup().await;

    let result = probe
        .test_provider(&server.uri(), &ApiKey::new("sk-x"))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.message.contains("404"), "got: {}", result.message);
}

#[tokio::test]
async fn test_reports_last_rejection_status() {
    let (server, probe) = setup().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = probe.probe(&server.uri(), &ApiKey::new("sk-x")).await;

    assert!(!result.success);
    assert!(
        result.message.starts_with("Provider returned 500 Internal Server Error"),
        "got: {}",
        result.message
    );
    assert!(!result.message.contains("404"));
}

#[tokio::test]
async fn test_missing_inputs_make_no_request() {
    let (server, probe) = setup().await;

    let result = probe.probe(&server.uri(), &ApiKey::default()).await;

    assert!(!result.success);
    assert_eq!(result.message, "Base URL and API key are required");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_host() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let probe = ProviderProbe::new().unwrap();

    let result = probe
        .probe(&format!("http://127.0.0.1:{port}"), &ApiKey::new("sk-x"))
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Could not connect - check your base URL");
}
