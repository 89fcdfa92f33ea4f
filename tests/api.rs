//! HTTP front-end integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ghost::api::{ApiState, ModulesResponse, RunResponse, router};
use ghost::devices::{Connection, MemoryConnector};
use tokio::sync::Mutex;
use tower::ServiceExt;

mod common;
use common::{bundled_plugins, sent_commands};

/// Build a test API router against a device at 10.0.0.5:5555
fn build_test_router(connector: &MemoryConnector) -> axum::Router {
    let device = Connection::new("10.0.0.5", 5555, Arc::new(connector.clone()));
    let state = Arc::new(ApiState {
        plugins: Arc::new(bundled_plugins()),
        device: Mutex::new(device),
    });
    router(state)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_list_modules() {
    let connector = MemoryConnector::new();
    let (status, body) = get(build_test_router(&connector), "/").await;

    assert_eq!(status, StatusCode::OK);
    let listing: ModulesResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(listing.modules, vec!["bluetooth", "shell", "wifi"]);
}

#[tokio::test]
async fn test_run_module_success() {
    let connector = MemoryConnector::new();
    let (status, body) = get(build_test_router(&connector), "/run_module/wifi?args=on").await;

    assert_eq!(status, StatusCode::OK);
    let run: RunResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(run.status, "success");
    assert_eq!(run.message, "Module wifi executed successfully.");
    assert_eq!(sent_commands(&connector), vec!["svc wifi enable"]);
}

#[tokio::test]
async fn test_run_module_usage() {
    let connector = MemoryConnector::new();
    let (status, body) = get(build_test_router(&connector), "/run_module/wifi").await;

    assert_eq!(status, StatusCode::OK);
    let run: RunResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(run.status, "error");
    assert_eq!(run.message, "Usage: wifi <on|off>");
    assert!(sent_commands(&connector).is_empty());
}

#[tokio::test]
async fn test_run_unknown_module() {
    let connector = MemoryConnector::new();
    let (status, body) = get(build_test_router(&connector), "/run_module/ghost").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let run: RunResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(run.status, "error");
    assert!(connector.log().opened.is_empty());
}

#[tokio::test]
async fn test_run_module_unreachable_device() {
    let connector = MemoryConnector::new();
    connector.refuse("10.0.0.5");
    let (status, body) = get(build_test_router(&connector), "/run_module/wifi?args=off").await;

    assert_eq!(status, StatusCode::OK);
    let run: RunResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(run.status, "error");
    assert_eq!(run.message, "Failed to connect to 10.0.0.5:5555");
}

#[tokio::test]
async fn test_shell_output_is_returned() {
    let connector = MemoryConnector::new();
    let (_, body) = get(
        build_test_router(&connector),
        "/run_module/shell?args=getprop%20ro.build.version.release",
    )
    .await;

    let run: RunResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(run.status, "success");
    assert_eq!(run.output.as_deref(), Some("getprop ro.build.version.release"));
}
