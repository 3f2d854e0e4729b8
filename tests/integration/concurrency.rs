//! Concurrency tests for the worker pool
//!
//! These tests verify that:
//! - A check identifier never runs on two workers at once
//! - Distinct checks do run in parallel
//! - Stats folds from many tasks are not lost

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use guardia_runner::check::stats::CheckStats;
use guardia_runner::check::{CheckError, CheckId, SenderStats};
use guardia_runner::runner::store::StatsStore;
use guardia_runner::runner::tracker::RunningChecksTracker;

use crate::helpers::{Outcome, TestCheck, spawn_runner};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_check_never_runs_concurrently() {
    let (runner, _events) = spawn_runner(8);
    let check = Arc::new(TestCheck::new("dedup:shared", Outcome::Ok).slow(Duration::from_millis(5)));

    for _ in 0..50 {
        runner.schedule(check.clone()).await.unwrap();
    }
    runner.stop().await;

    let runs = check.runs();
    assert!(runs >= 1);
    assert_eq!(check.max_in_flight.load(Ordering::SeqCst), 1);

    // skipped copies are not counted as runs
    let status = runner.status();
    assert_eq!(status.counters.runs, runs as i64);
    assert_eq!(
        runner.store().stats(&check.id).unwrap().snapshot().total_runs,
        runs as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_checks_run_in_parallel() {
    let (runner, _events) = spawn_runner(4);
    let checks: Vec<_> = (0..4)
        .map(|idx| {
            Arc::new(
                TestCheck::new(&format!("parallel:{idx}"), Outcome::Ok)
                    .slow(Duration::from_millis(200)),
            )
        })
        .collect();

    let start = Instant::now();
    for check in &checks {
        runner.schedule(check.clone()).await.unwrap();
    }
    runner.stop().await;

    assert!(
        start.elapsed() < Duration::from_millis(700),
        "4 workers should overlap 4 slow checks, took {:?}",
        start.elapsed()
    );
    assert!(checks.iter().all(|check| check.runs() == 1));
    assert_eq!(runner.status().counters.runs, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_folds_are_not_lost() {
    let store = Arc::new(StatsStore::<CheckStats>::new());

    let tasks: Vec<_> = (0..16)
        .map(|task| {
            let store = store.clone();
            tokio::spawn(async move {
                let id = CheckId::new(&format!("group{}", task % 4), &task.to_string());
                for run in 0..100 {
                    let error = (run % 10 == 0).then(|| CheckError::new("boom"));
                    store.fold_run_stats(
                        &id,
                        Duration::from_millis(1),
                        error.as_ref(),
                        &[],
                        SenderStats::default(),
                    );
                }
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 4);
    for group in snapshot.values() {
        assert_eq!(group.len(), 4);
        for stats in group.values() {
            let stats = stats.snapshot();
            assert_eq!(stats.total_runs, 100);
            assert_eq!(stats.total_errors, 10);
        }
    }
}

#[test]
fn test_tracker_admits_single_registration() {
    let tracker = Arc::new(RunningChecksTracker::new());
    let id = CheckId::from("race:single");

    let winners: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tracker = tracker.clone();
                let id = id.clone();
                scope.spawn(move || tracker.register(&id))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum()
    });

    assert_eq!(winners, 1);
    assert!(tracker.is_running(&id));
}
