//! End-to-end tests of the HTTP surface over a real socket.

use std::collections::HashSet;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use status_service::config::ServiceConfig;

mod common;

#[tokio::test]
async fn healthz_reports_healthy() {
    let server = common::start_server(ServiceConfig::default()).await;

    let res = common::client()
        .get(server.url("/healthz"))
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_ms"].as_u64().is_some());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn status_echoes_request_id() {
    let server = common::start_server(ServiceConfig::default()).await;

    let res = common::client()
        .get(server.url("/"))
        .header("User-Agent", "endpoint-test")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/json");
    let header_id: u64 = res.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["request_id"], header_id);
    assert_eq!(body["path"], "/");
    assert_eq!(body["method"], "GET");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn preflight_returns_cors_headers() {
    let server = common::start_server(ServiceConfig::default()).await;

    let res = common::client()
        .request(Method::OPTIONS, server.url("/health"))
        .header("Origin", "https://example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        res.headers()["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        res.headers()["access-control-allow-headers"],
        "Content-Type, Authorization"
    );
    assert!(res.text().await.unwrap().is_empty());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn unmatched_path_returns_error_shape() {
    let server = common::start_server(ServiceConfig::default()).await;

    let res = common::client()
        .post(server.url("/does/not/exist"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Resource not found");
    assert_eq!(body["path"], "/does/not/exist");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_requests_get_contiguous_ids() {
    let server = common::start_server(ServiceConfig::default()).await;
    let client = common::client();
    let total = 40;

    let tasks: Vec<_> = (0..total)
        .map(|_| {
            let client = client.clone();
            let url = server.url("/");
            tokio::spawn(async move {
                let res = client.get(url).send().await.unwrap();
                assert_eq!(res.status(), StatusCode::OK);
                let body: Value = res.json().await.unwrap();
                body["request_id"].as_u64().unwrap()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }

    assert_eq!(ids.len(), total);
    let first = *ids.iter().min().unwrap();
    let expected: HashSet<u64> = (first..first + total as u64).collect();
    assert_eq!(ids, expected);

    server.stop().await.unwrap();
}
