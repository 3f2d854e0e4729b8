//! Integration tests for the status API
//!
//! These tests verify that:
//! - The health endpoint answers
//! - The runner endpoint exposes counters and grouped stats
//! - Single check stats are served, unknown checks are 404

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use guardia_runner::api::{ApiConfig, ApiState, spawn_api_server};
use guardia_runner::runner::RunnerHandle;
use serde_json::Value;

use crate::helpers::{Outcome, TestCheck, spawn_runner};

async fn spawn_test_api(runner: RunnerHandle) -> SocketAddr {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
    };

    spawn_api_server(config, ApiState::new(runner)).await.unwrap()
}

async fn runner_with_history() -> RunnerHandle {
    let (runner, _events) = spawn_runner(1);

    runner
        .schedule(Arc::new(TestCheck::new("web:frontend", Outcome::Ok)))
        .await
        .unwrap();
    runner
        .schedule(Arc::new(TestCheck::new("web:backend", Outcome::Fail("502"))))
        .await
        .unwrap();
    runner.stop().await;

    runner
}

#[tokio::test]
async fn test_health_endpoint() {
    let (runner, _events) = spawn_runner(1);
    let addr = spawn_test_api(runner.clone()).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["workers"], 1);
    assert_eq!(body["running_checks"], 0);
    assert!(body["timestamp"].is_string());

    runner.stop().await;
}

#[tokio::test]
async fn test_health_reports_stopped_pool() {
    let runner = runner_with_history().await;
    let addr = spawn_test_api(runner).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "stopped");
    assert_eq!(body["workers"], 0);
}

#[tokio::test]
async fn test_runner_status_endpoint() {
    let runner = runner_with_history().await;
    let addr = spawn_test_api(runner).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/runner"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["Runs"], 2);
    assert_eq!(body["Errors"], 1);
    assert_eq!(body["Workers"], 0);
    assert_eq!(body["running"], serde_json::json!({}));

    let group = body["Checks"]["web"].as_object().unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group["web:backend"]["last_error"], "502");
}

#[tokio::test]
async fn test_check_stats_endpoint() {
    let runner = runner_with_history().await;
    let addr = spawn_test_api(runner).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/checks/web:frontend"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["check_id"], "web:frontend");
    assert_eq!(body["check_name"], "web");
    assert_eq!(body["total_runs"], 1);
    assert!(body["last_error"].is_null());
}

#[tokio::test]
async fn test_unknown_check_is_not_found() {
    let runner = runner_with_history().await;
    let addr = spawn_test_api(runner).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/checks/web:missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("web:missing"));
}
