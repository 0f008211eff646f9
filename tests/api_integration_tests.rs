//! End-to-end tests for the HTTP surface with provider endpoints mocked

use axum::http::StatusCode;
use axum_test::TestServer;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{Value, json};
use std::sync::Arc;

use intel_relay::{
    Config,
    domain::check_compliance_value,
    infrastructure::MemoryStore,
    presentation::{AppState, create_router},
};

fn vendor_config(server: &ServerGuard) -> Config {
    let mut config = Config::default();
    config.vendor.auth_url = format!("{}/api/v1/login", server.url());
    config.vendor.intel_url = format!("{}/api/intel/v2/byobject", server.url());
    config.vendor.passive_dns_url = format!("{}/api/pdns/v1", server.url());
    config.vendor.content_url = format!("{}/lookup/v1", server.url());
    config.vendor.username = Some("user".to_string());
    config.vendor.password = Some("secret".to_string());
    config.vendor.content_key = Some("content-key".to_string());
    config.providers.ip_abuse.base_url = server.url();
    config.providers.ip_abuse.api_key = Some("abuse-key".to_string());
    config
}

fn create_test_server(config: &Config) -> TestServer {
    let state = AppState::from_config(config, Arc::new(MemoryStore::new()))
        .expect("Failed to build app state");
    TestServer::new(create_router(state, config)).expect("Failed to create test server")
}

async fn mock_login(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/api/v1/login")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"token": "tok-1"}).to_string())
        .create_async()
        .await
}

fn assert_compliant(body: &Value) {
    let report = check_compliance_value(body);
    assert!(report.compliant, "response leaked vendor detail: {:?}", report.violations);
}

#[tokio::test]
async fn test_clean_address_is_served_from_cache_on_repeat() {
    let mut vendor = Server::new_async().await;
    let _login = mock_login(&mut vendor).await;
    let lookup = vendor
        .mock("GET", "/api/intel/v2/byobject/cidr/8.8.8.8/32")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let server = create_test_server(&vendor_config(&vendor));
    let request = json!({"targetType": "ip", "targetValue": "8.8.8.8", "correlationId": "scan-1"});

    let first = server.post("/api/v1/enrich").json(&request).await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let body: Value = first.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["verdict"], "low");
    assert_eq!(body["data"]["cacheHit"], false);
    assert_eq!(body["data"]["categories"], json!([]));
    assert_compliant(&body);

    let second = server.post("/api/v1/enrich").json(&request).await;
    assert_eq!(second.status_code(), StatusCode::OK);
    let body: Value = second.json();
    assert_eq!(body["data"]["cacheHit"], true);
    assert_eq!(body["data"]["verdict"], "low");
    assert_compliant(&body);

    lookup.assert_async().await;
}

#[tokio::test]
async fn test_listed_domain_reports_neutral_categories() {
    let mut vendor = Server::new_async().await;
    let _login = mock_login(&mut vendor).await;
    let _lookup = vendor
        .mock("GET", "/api/intel/v2/byobject/domain/bad.example.com")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"results": [
                {"dataset": "SBL", "reason": "spam operation", "cc": "nl"},
                {"dataset": "DBL", "botname": "botnet-c2"}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let server = create_test_server(&vendor_config(&vendor));
    let response = server
        .post("/api/v1/enrich")
        .json(&json!({"targetType": "domain", "targetValue": "Bad.Example.com"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["inputValue"], "bad.example.com");
    assert_eq!(body["data"]["verdict"], "high");
    let categories = body["data"]["categories"].as_array().unwrap();
    assert!(categories.contains(&json!("spam_source")));
    assert!(categories.contains(&json!("botnet_c2")));
    assert_compliant(&body);
}

#[tokio::test]
async fn test_passive_dns_activity_is_bucketed() {
    let mut vendor = Server::new_async().await;
    let _login = mock_login(&mut vendor).await;
    let records: Vec<Value> = (0..3)
        .map(|i| json!({"rrname": format!("host{i}.example"), "rrtype": "A"}))
        .collect();
    let _lookup = vendor
        .mock("GET", "/api/pdns/v1/lookup")
        .match_query(Matcher::UrlEncoded("q".into(), "example.org".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"records": records}).to_string())
        .create_async()
        .await;

    let server = create_test_server(&vendor_config(&vendor));
    let response = server
        .post("/api/v1/enrich/passive-dns")
        .json(&json!({"targetType": "domain", "targetValue": "example.org"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["provider"], "dns_activity");
    assert!(body.to_string().find("host0.example").is_none());
    assert_compliant(&body);
}

#[tokio::test]
async fn test_content_lookup_requires_domain() {
    let vendor = Server::new_async().await;
    let server = create_test_server(&vendor_config(&vendor));

    let response = server
        .post("/api/v1/enrich/content")
        .json(&json!({"targetType": "ip", "targetValue": "8.8.8.8"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_vendor_login_failure_is_auth_failed() {
    let mut vendor = Server::new_async().await;
    let _login = vendor
        .mock("POST", "/api/v1/login")
        .with_status(401)
        .create_async()
        .await;

    let server = create_test_server(&vendor_config(&vendor));
    let response = server
        .post("/api/v1/enrich")
        .json(&json!({"targetType": "ip", "targetValue": "8.8.8.8"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "auth_failed");
}

#[tokio::test]
async fn test_generic_provider_lookup_returns_findings() {
    let mut upstream = Server::new_async().await;
    let _check = upstream
        .mock("GET", "/check")
        .match_query(Matcher::Any)
        .match_header("key", "abuse-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"data": {
                "ipAddress": "8.8.8.8", "abuseConfidenceScore": 40, "countryCode": "US",
                "totalReports": 3, "usageType": "Data Center", "isp": "Example ISP"
            }})
            .to_string(),
        )
        .create_async()
        .await;

    let server = create_test_server(&vendor_config(&upstream));
    let response = server
        .post("/api/v1/providers/ip_abuse/lookup")
        .json(&json!({"targetType": "ip", "targetValue": "8.8.8.8"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["provider"], "ip_abuse");
    assert_eq!(body["unavailable"], false);
    assert_eq!(body["findings"][0]["risk"], "medium");
    assert_eq!(body["findings"][0]["attributes"]["abuse_score"], "40");
}

#[tokio::test]
async fn test_failing_provider_trips_circuit_until_reset() {
    let mut upstream = Server::new_async().await;
    let check = upstream
        .mock("GET", "/check")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let mut config = vendor_config(&upstream);
    config.runtime.max_retries = 0;
    config.runtime.circuit_failure_threshold = 2;
    let server = create_test_server(&config);
    let request = json!({"targetType": "ip", "targetValue": "8.8.8.8", "skipCache": true});

    for _ in 0..2 {
        let response = server.post("/api/v1/providers/ip_abuse/lookup").json(&request).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["unavailable"], true);
    }

    let response = server.post("/api/v1/providers/ip_abuse/lookup").json(&request).await;
    let body: Value = response.json();
    assert_eq!(body["findings"][0]["attributes"]["reason_code"], "circuit_open");
    check.assert_async().await;

    let health: Value = server.get("/health/detailed").await.json();
    assert_eq!(health["status"], "degraded");

    let reset = server.post("/api/v1/providers/ip_abuse/circuit/reset").await;
    assert_eq!(reset.status_code(), StatusCode::OK);
    let body: Value = reset.json();
    assert_eq!(body["reset"], true);

    let health: Value = server.get("/health/detailed").await.json();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_reset_unknown_circuit_is_404() {
    let server = create_test_server(&Config::default());
    let response = server.post("/api/v1/providers/nope/circuit/reset").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
