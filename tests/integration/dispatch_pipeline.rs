//! End-to-end tests of checks flowing through the runner
//!
//! These tests verify that:
//! - Every run is reported once as a service check with the right status
//! - Counters and per-check stats reflect the outcomes
//! - Long-running checks are not reported as service checks
//! - A missing sender never prevents a run
//! - A check panicking outside its run neither kills a worker nor stays registered

use std::sync::Arc;

use guardia_runner::check::CheckId;
use guardia_runner::sender::{
    CHECK_STATUS_SERVICE_CHECK, ServiceCheckStatus, StaticSenderProvider,
};
use pretty_assertions::assert_eq;

use crate::helpers::{
    Outcome, TEST_HOSTNAME, TestCheck, collect_events, spawn_runner, spawn_runner_with_provider,
};

#[tokio::test]
async fn test_outcomes_are_reported_as_service_checks() {
    let (runner, mut events) = spawn_runner(2);

    runner
        .schedule(Arc::new(TestCheck::new("ok:a", Outcome::Ok)))
        .await
        .unwrap();
    runner
        .schedule(Arc::new(TestCheck::new("warn:a", Outcome::Warn("disk almost full"))))
        .await
        .unwrap();
    runner
        .schedule(Arc::new(TestCheck::new("fail:a", Outcome::Fail("connection refused"))))
        .await
        .unwrap();
    runner.stop().await;

    let mut events = collect_events(&mut events);
    events.sort_by(|a, b| a.tags.cmp(&b.tags));

    assert_eq!(events.len(), 3);
    for event in &events {
        assert_eq!(event.name, CHECK_STATUS_SERVICE_CHECK);
        assert_eq!(event.hostname, TEST_HOSTNAME);
        assert_eq!(event.message, "");
    }

    let statuses: Vec<_> = events
        .iter()
        .map(|e| (e.tags[0].as_str(), e.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("check:fail", ServiceCheckStatus::Critical),
            ("check:ok", ServiceCheckStatus::Ok),
            ("check:warn", ServiceCheckStatus::Warning),
        ]
    );
}

#[tokio::test]
async fn test_counters_and_stats_reflect_outcomes() {
    let (runner, _events) = spawn_runner(1);

    for _ in 0..3 {
        runner
            .schedule(Arc::new(TestCheck::new("db:primary", Outcome::Fail("timeout"))))
            .await
            .unwrap();
    }
    runner
        .schedule(Arc::new(TestCheck::new("db:replica", Outcome::Warn("lagging"))))
        .await
        .unwrap();
    runner.stop().await;

    let status = runner.status();
    assert_eq!(status.counters.runs, 4);
    assert_eq!(status.counters.errors, 3);
    assert_eq!(status.counters.warnings, 1);
    assert_eq!(status.counters.running_checks, 0);
    assert!(status.running.is_empty());

    let group = &status.checks["db"];
    assert_eq!(group.len(), 2);

    let primary = group[&CheckId::from("db:primary")].snapshot();
    assert_eq!(primary.total_runs, 3);
    assert_eq!(primary.total_errors, 3);
    assert_eq!(primary.last_error.as_deref(), Some("timeout"));

    let replica = group[&CheckId::from("db:replica")].snapshot();
    assert_eq!(replica.total_warnings, 1);
    assert_eq!(replica.last_warnings, vec!["lagging".to_string()]);
}

#[tokio::test]
async fn test_long_running_check_skips_service_check() {
    let (runner, mut events) = spawn_runner(1);

    runner
        .schedule(Arc::new(TestCheck::new("stream:ok", Outcome::Ok).long_running()))
        .await
        .unwrap();
    runner
        .schedule(Arc::new(
            TestCheck::new("stream:broken", Outcome::Fail("stream closed")).long_running(),
        ))
        .await
        .unwrap();
    runner.stop().await;

    assert!(collect_events(&mut events).is_empty());

    let status = runner.status();
    assert_eq!(status.counters.runs, 2);
    assert_eq!(status.counters.errors, 1);

    // only the failing one is recorded
    assert!(runner.store().stats(&CheckId::from("stream:ok")).is_none());
    assert!(runner.store().stats(&CheckId::from("stream:broken")).is_some());
}

#[tokio::test]
async fn test_runs_without_sender() {
    let runner = spawn_runner_with_provider(1, Arc::new(StaticSenderProvider::unavailable()));
    let check = Arc::new(TestCheck::new("nosender:a", Outcome::Ok));

    runner.schedule(check.clone()).await.unwrap();
    runner.stop().await;

    assert_eq!(check.runs(), 1);
    assert_eq!(runner.status().counters.runs, 1);
    assert!(runner.store().stats(&check.id).is_some());
}

#[tokio::test]
async fn test_sender_stats_are_accumulated() {
    let (runner, _events) = spawn_runner(1);
    let check = Arc::new(TestCheck::new("metrics:a", Outcome::Ok));

    for _ in 0..3 {
        runner.schedule(check.clone()).await.unwrap();
    }
    runner.stop().await;

    let stats = runner.store().stats(&check.id).unwrap().snapshot();
    assert_eq!(stats.sender_stats.metric_samples, 1);
    assert_eq!(stats.total_sender_stats.metric_samples, 3);
}

#[tokio::test]
async fn test_panic_outside_run_keeps_pool_usable() {
    let (runner, mut events) = spawn_runner(1);

    runner
        .schedule(Arc::new(TestCheck::new("flaky:a", Outcome::PanicInWarnings)))
        .await
        .unwrap();
    let healthy = Arc::new(TestCheck::new("flaky:a", Outcome::Ok));
    runner.schedule(healthy.clone()).await.unwrap();
    runner.stop().await;

    // the only worker survived to run the second copy
    assert_eq!(healthy.runs(), 1);

    let status = runner.status();
    assert_eq!(status.counters.workers, 0);
    assert_eq!(status.counters.running_checks, 0);
    assert_eq!(status.counters.runs, 1);
    assert!(status.running.is_empty());

    let events = collect_events(&mut events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, ServiceCheckStatus::Ok);
}
