//! End-to-end tests: real listener, mock backends, static discovery.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_gateway::discovery::StaticDiscovery;
use api_gateway::scheduler::Endpoint;
use reqwest::StatusCode;

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn endpoint(addr: std::net::SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn test_round_robin_across_instances() {
    let a = common::start_echo_backend("a").await;
    let b = common::start_echo_backend("b").await;
    let c = common::start_echo_backend("c").await;

    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(a), endpoint(b), endpoint(c)]);
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "svcA")]), discovery).await;

    let client = client();
    let mut seen = HashSet::new();
    for _ in 0..3 {
        let body = client.get(gw.url("/api/ping")).send().await.unwrap().text().await.unwrap();
        seen.insert(body);
    }
    let expected: HashSet<String> = ["a /ping", "b /ping", "c /ping"].iter().map(|s| s.to_string()).collect();
    assert_eq!(seen, expected);

    let body = client.get(gw.url("/api/ping")).send().await.unwrap().text().await.unwrap();
    assert!(expected.contains(&body));
    assert_eq!(gw.stats.success(), 4);
    assert_eq!(gw.stats.error(), 0);
}

#[tokio::test]
async fn test_unmatched_path_returns_default_response() {
    let discovery = Arc::new(StaticDiscovery::new());
    let mut config = common::config_with_routes(&[("/api", "svcA")]);
    config.default_response.status_code = 404;
    config.default_response.body = "nothing here".to_string();
    let gw = common::start_gateway(config, discovery).await;

    let response = client().get(gw.url("/other")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "nothing here");
    assert_eq!(gw.stats.error(), 1);
    assert_eq!(gw.stats.success(), 0);
}

#[tokio::test]
async fn test_undiscoverable_service_is_bad_gateway() {
    let discovery = Arc::new(StaticDiscovery::new());
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "ghost")]), discovery).await;

    let response = client().get(gw.url("/api/x")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(gw.stats.error(), 1);
}

#[tokio::test]
async fn test_upstream_error_status_counts_as_error() {
    let backend = common::start_programmable_backend(|_| async { (500, "boom".to_string()) }).await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(backend)]);
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "svcA")]), discovery).await;

    let response = client().get(gw.url("/api/x")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "boom");
    assert_eq!(gw.stats.error(), 1);
    assert_eq!(gw.stats.success(), 0);
}

#[tokio::test]
async fn test_redirect_counts_as_success() {
    let backend = common::start_programmable_backend(|_| async { (302, String::new()) }).await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(backend)]);
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "svcA")]), discovery).await;

    let client = reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client.get(gw.url("/api/x")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(gw.stats.success(), 1);
}

#[tokio::test]
async fn test_prefix_stripped_and_query_kept() {
    let backend = common::start_echo_backend("users").await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(backend)]);
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "svcA")]), discovery).await;

    let client = client();
    let body = client.get(gw.url("/api/users/7?full=1")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "users /users/7?full=1");

    let body = client.get(gw.url("/api")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "users /");
}

#[tokio::test]
async fn test_longest_prefix_wins() {
    let short = common::start_echo_backend("short").await;
    let long = common::start_echo_backend("long").await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcShort", vec![endpoint(short)]);
    discovery.set("svcLong", vec![endpoint(long)]);
    let config = common::config_with_routes(&[("/api", "svcShort"), ("/api/v2", "svcLong")]);
    let gw = common::start_gateway(config, discovery).await;

    let client = client();
    let body = client.get(gw.url("/api/v2/x")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "long /x");
    let body = client.get(gw.url("/api/v1/x")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "short /v1/x");
}

#[tokio::test]
async fn test_stats_endpoint_reports_counts_and_latency() {
    let backend = common::start_echo_backend("a").await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(backend)]);
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "svcA")]), discovery).await;

    let client = client();
    client.get(gw.url("/api/ok")).send().await.unwrap();
    client.get(gw.url("/nowhere")).send().await.unwrap();

    let response = client.get(gw.url("/stats")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["request_count"]["success"], 1);
    assert_eq!(json["request_count"]["error"], 1);
    assert!(json["latency_ms"]["average"].is_number());
    assert!(json["latency_ms"]["p99"].is_number());
}

#[tokio::test]
async fn test_request_id_generated_or_preserved() {
    let discovery = Arc::new(StaticDiscovery::new());
    let gw = common::start_gateway(common::config_with_routes(&[]), discovery).await;
    let client = client();

    let response = client.get(gw.url("/stats")).send().await.unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(id.len(), 36);

    let response = client
        .get(gw.url("/stats"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_refresh_picks_up_new_instances() {
    let old = common::start_echo_backend("old").await;
    let new = common::start_echo_backend("new").await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(old)]);

    let mut config = common::config_with_routes(&[("/api", "svcA")]);
    config.discovery.refresh_interval_ms = 50;
    let gw = common::start_gateway(config, discovery.clone()).await;

    let client = client();
    let body = client.get(gw.url("/api/x")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "old /x");

    discovery.set("svcA", vec![endpoint(new)]);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // One request may still drain the previous queue.
    let mut last = String::new();
    for _ in 0..2 {
        last = client.get(gw.url("/api/x")).send().await.unwrap().text().await.unwrap();
    }
    assert_eq!(last, "new /x");
}

#[tokio::test]
async fn test_concurrent_requests_all_counted() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let backend = common::start_programmable_backend(move |_| {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (200, "ok".to_string())
        }
    })
    .await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(backend)]);
    let gw = common::start_gateway(common::config_with_routes(&[("/api", "svcA")]), discovery).await;

    let client = client();
    let mut tasks = Vec::new();
    for _ in 0..50 {
        let client = client.clone();
        let url = gw.url("/api/x");
        tasks.push(tokio::spawn(async move { client.get(url).send().await.unwrap().status() }));
    }
    for t in tasks {
        assert_eq!(t.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 50);
    assert_eq!(gw.stats.success(), 50);
    assert_eq!(gw.stats.latency().count(), 50);
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let discovery = Arc::new(StaticDiscovery::new());
    let gw = common::start_gateway(common::config_with_routes(&[]), discovery).await;

    gw.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), gw.task).await;
    assert!(result.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_slow_upstream_is_gateway_timeout_and_counted() {
    let backend = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "late".to_string())
    })
    .await;
    let discovery = Arc::new(StaticDiscovery::new());
    discovery.set("svcA", vec![endpoint(backend)]);
    let mut config = common::config_with_routes(&[("/api", "svcA")]);
    config.timeouts.upstream_secs = 1;
    assert!(api_gateway::config::validate_config(&config).is_ok());
    let gw = common::start_gateway(config, discovery).await;

    let response = client().get(gw.url("/api/x")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(gw.stats.error(), 1);
    assert_eq!(gw.stats.success(), 0);
    assert_eq!(gw.stats.latency().count(), 1);
}
