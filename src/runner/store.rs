//! Runtime statistics of the runner
//!
//! One store per process, shared by reference between the workers and the
//! status API. It holds:
//!
//! - grouped runtime aggregates (`group -> id -> aggregate`)
//! - the live map of checks currently executing (`id -> start time`)
//! - the global runner counters
//!
//! Every operation takes a single critical section. Empty groups are removed
//! as soon as their last instance goes away, so an agent that keeps adding
//! and removing dynamically discovered checks does not accumulate structure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::check::stats::{CheckStats, RuntimeAggregate};
use crate::check::{CheckError, CheckId, SenderStats};

/// Aggregates grouped by check name, then by instance
pub type GroupedStats<A> = HashMap<String, HashMap<CheckId, Arc<A>>>;

/// Global runner counters
///
/// Each counter is only ever moved by a signed delta. Nothing prevents a
/// counter from going below zero.
#[derive(Debug, Default)]
pub struct RunnerCounters {
    workers: AtomicI64,
    running_checks: AtomicI64,
    runs: AtomicI64,
    warnings: AtomicI64,
    errors: AtomicI64,
}

/// Plain copy of [`RunnerCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CounterValues {
    pub workers: i64,
    pub running_checks: i64,
    pub runs: i64,
    pub warnings: i64,
    pub errors: i64,
}

impl RunnerCounters {
    /// Returns the new value
    pub fn adjust_workers(&self, delta: i64) -> i64 {
        self.workers.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Returns the new value
    pub fn adjust_running_checks(&self, delta: i64) -> i64 {
        self.running_checks.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Returns the new value
    pub fn adjust_runs(&self, delta: i64) -> i64 {
        self.runs.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Returns the new value
    pub fn adjust_warnings(&self, delta: i64) -> i64 {
        self.warnings.fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Returns the new value
    pub fn adjust_errors(&self, delta: i64) -> i64 {
        self.errors.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn values(&self) -> CounterValues {
        CounterValues {
            workers: self.workers.load(Ordering::SeqCst),
            running_checks: self.running_checks.load(Ordering::SeqCst),
            runs: self.runs.load(Ordering::SeqCst),
            warnings: self.warnings.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }
}

/// Serializable view of the whole store, as exposed on the status API
#[derive(Debug, Serialize)]
pub struct RunnerStatus<A = CheckStats> {
    #[serde(flatten)]
    pub counters: CounterValues,

    /// Checks currently executing, with their start time in unix seconds
    pub running: HashMap<CheckId, i64>,

    #[serde(rename = "Checks")]
    pub checks: GroupedStats<A>,
}

/// Process-wide runtime statistics
#[derive(Debug)]
pub struct StatsStore<A = CheckStats> {
    groups: RwLock<GroupedStats<A>>,
    running: Mutex<HashMap<CheckId, DateTime<Utc>>>,
    counters: RunnerCounters,
}

impl<A> Default for StatsStore<A> {
    fn default() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            counters: RunnerCounters::default(),
        }
    }
}

impl<A: RuntimeAggregate> StatsStore<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed run into the aggregate of `id`, creating the group
    /// and the aggregate on first use
    pub fn fold_run_stats(
        &self,
        id: &CheckId,
        execution_time: Duration,
        error: Option<&CheckError>,
        warnings: &[CheckError],
        sender_stats: SenderStats,
    ) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);

        trace!("adding stats for {id}");

        let aggregate = groups
            .entry(id.group().to_string())
            .or_default()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(A::new(id)));

        aggregate.fold(execution_time, error, warnings, sender_stats);
    }

    /// Drop the aggregate of `id`, removing its group once empty
    pub fn remove_stats(&self, id: &CheckId) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);

        debug!("removing stats for {id}");

        let group = id.group();
        let Some(instances) = groups.get_mut(group) else {
            warn!("stats for check {id} not found");
            return;
        };

        if instances.remove(id).is_none() {
            warn!("stats for check {id} not found");
        }

        if instances.is_empty() {
            groups.remove(group);
        }
    }

    /// Aggregate of `id`, shared with the store
    pub fn stats(&self, id: &CheckId) -> Option<Arc<A>> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);

        groups.get(id.group())?.get(id).cloned()
    }

    /// Copy of both map levels; aggregates are shared, not cloned
    pub fn snapshot(&self) -> GroupedStats<A> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget every aggregate
    pub fn reset_all(&self) {
        warn!("resetting all check stats");

        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_running(&self, id: &CheckId, started_at: DateTime<Utc>) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), started_at);
    }

    pub fn clear_running(&self, id: &CheckId) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Copy of the checks currently executing
    pub fn running(&self) -> HashMap<CheckId, DateTime<Utc>> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn counters(&self) -> &RunnerCounters {
        &self.counters
    }

    /// Everything the status surface shows, copied out of the store
    pub fn status(&self) -> RunnerStatus<A> {
        RunnerStatus {
            counters: self.counters.values(),
            running: self
                .running()
                .into_iter()
                .map(|(id, started_at)| (id, started_at.timestamp()))
                .collect(),
            checks: self.snapshot(),
        }
    }
}
