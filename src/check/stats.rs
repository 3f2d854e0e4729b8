//! Per-check runtime aggregates
//!
//! The stats store is agnostic to what an aggregate keeps: it only creates
//! aggregates lazily, folds runs into them and reads back the run count that
//! drives log throttling. [`CheckStats`] is the aggregate used by default.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::{CheckError, CheckId, SenderStats};

/// Number of execution times kept for the rolling average
const EXECUTION_TIMES_SIZE: usize = 32;

/// Accumulator of a check's historical run outcomes
///
/// Implementations are shared by reference between the store and any caller
/// that fetched them, so folding must be safe under concurrent access.
pub trait RuntimeAggregate: Send + Sync + 'static {
    /// Create an empty aggregate for the given check
    fn new(id: &CheckId) -> Self
    where
        Self: Sized;

    /// Fold the outcome of one completed run
    fn fold(
        &self,
        execution_time: Duration,
        error: Option<&CheckError>,
        warnings: &[CheckError],
        sender_stats: SenderStats,
    );

    /// Number of folds performed so far
    fn total_runs(&self) -> u64;
}

/// Point-in-time copy of a [`CheckStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckStatsSnapshot {
    pub check_id: CheckId,
    pub check_name: String,
    pub total_runs: u64,
    pub total_errors: u64,
    pub total_warnings: u64,
    pub execution_times_ms: VecDeque<u64>,
    pub average_execution_time_ms: u64,
    pub last_execution_time_ms: u64,
    pub last_error: Option<String>,
    pub last_warnings: Vec<String>,
    pub last_successful_run: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// What the last run submitted
    pub sender_stats: SenderStats,
    /// What all runs submitted so far
    pub total_sender_stats: SenderStats,
}

/// Default runtime aggregate
#[derive(Debug)]
pub struct CheckStats {
    inner: Mutex<CheckStatsSnapshot>,
}

impl CheckStats {
    /// Copy the current state out of the lock
    pub fn snapshot(&self) -> CheckStatsSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RuntimeAggregate for CheckStats {
    fn new(id: &CheckId) -> Self {
        Self {
            inner: Mutex::new(CheckStatsSnapshot {
                check_id: id.clone(),
                check_name: id.group().to_string(),
                total_runs: 0,
                total_errors: 0,
                total_warnings: 0,
                execution_times_ms: VecDeque::with_capacity(EXECUTION_TIMES_SIZE),
                average_execution_time_ms: 0,
                last_execution_time_ms: 0,
                last_error: None,
                last_warnings: vec![],
                last_successful_run: None,
                updated_at: None,
                sender_stats: SenderStats::default(),
                total_sender_stats: SenderStats::default(),
            }),
        }
    }

    fn fold(
        &self,
        execution_time: Duration,
        error: Option<&CheckError>,
        warnings: &[CheckError],
        sender_stats: SenderStats,
    ) {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let elapsed_ms = u64::try_from(execution_time.as_millis()).unwrap_or(u64::MAX);

        stats.total_runs += 1;
        stats.last_execution_time_ms = elapsed_ms;

        if stats.execution_times_ms.len() == EXECUTION_TIMES_SIZE {
            stats.execution_times_ms.pop_front();
        }
        stats.execution_times_ms.push_back(elapsed_ms);
        let sum: u64 = stats.execution_times_ms.iter().sum();
        stats.average_execution_time_ms = sum / stats.execution_times_ms.len() as u64;

        match error {
            Some(err) => {
                stats.total_errors += 1;
                stats.last_error = Some(err.to_string());
            }
            None => {
                stats.last_error = None;
                stats.last_successful_run = Some(now);
            }
        }

        stats.total_warnings += warnings.len() as u64;
        stats.last_warnings = warnings.iter().map(ToString::to_string).collect();

        stats.sender_stats = sender_stats;
        stats.total_sender_stats.merge(&sender_stats);
        stats.updated_at = Some(now);
    }

    fn total_runs(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total_runs
    }
}

impl Serialize for CheckStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}
