//! Fixed-interval feeder for the runner queue
//!
//! Every scheduled check gets a ticker task enqueuing it once per interval.
//! Long-running checks (zero interval) are enqueued a single time.
//!
//! [`ScheduledChecks`] answers whether a check is still scheduled, which the
//! workers use to avoid recording stats for checks removed mid-run.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, instrument, warn};

use crate::check::stats::{CheckStats, RuntimeAggregate};
use crate::check::{Check, CheckId};
use crate::runner::RunnerHandle;
use crate::worker::ShouldAddCheckStatsFn;

/// Set of currently scheduled check identifiers
#[derive(Debug, Clone, Default)]
pub struct ScheduledChecks {
    ids: Arc<Mutex<HashSet<CheckId>>>,
}

impl ScheduledChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &CheckId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn insert(&self, id: CheckId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    fn remove(&self, id: &CheckId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Predicate handed to the workers
    pub fn should_add_check_stats(&self) -> ShouldAddCheckStatsFn {
        let scheduled = self.clone();
        Arc::new(move |id: &CheckId| scheduled.contains(id))
    }
}

pub struct IntervalFeeder<A = CheckStats> {
    runner: RunnerHandle<A>,
    scheduled: ScheduledChecks,
    tickers: Mutex<HashMap<CheckId, JoinHandle<()>>>,
}

impl<A: RuntimeAggregate> IntervalFeeder<A> {
    pub fn new(runner: RunnerHandle<A>, scheduled: ScheduledChecks) -> Self {
        Self {
            runner,
            scheduled,
            tickers: Mutex::new(HashMap::new()),
        }
    }

    /// Start feeding `check` to the runner
    ///
    /// Returns `false` if a check with the same identifier is already scheduled.
    pub fn schedule(&self, check: Arc<dyn Check>) -> bool {
        let id = check.id();

        // Held across both steps so `unschedule` always finds the ticker.
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.scheduled.insert(id.clone()) {
            warn!("check {id} is already scheduled");
            return false;
        }

        tickers.insert(id, tokio::spawn(feed(self.runner.clone(), check)));
        true
    }

    /// Stop feeding the check and forget its stats
    pub fn unschedule(&self, id: &CheckId) -> bool {
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.scheduled.remove(id) {
            return false;
        }

        if let Some(ticker) = tickers.remove(id) {
            ticker.abort();
        }
        drop(tickers);

        self.runner.remove_check_stats(id);
        debug!("unscheduled check {id}");
        true
    }

    pub fn scheduled(&self) -> &ScheduledChecks {
        &self.scheduled
    }

    /// Stop every ticker; checks already queued still run
    pub fn shutdown(&self) {
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, ticker) in tickers.drain() {
            ticker.abort();
        }
    }
}

#[instrument(skip_all, fields(check = %check.id()))]
async fn feed<A: RuntimeAggregate>(runner: RunnerHandle<A>, check: Arc<dyn Check>) {
    let period = check.interval();

    if period.is_zero() {
        if let Err(e) = runner.schedule(check).await {
            warn!("failed to enqueue long-running check: {e:#}");
        }
        return;
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = runner.schedule(check.clone()).await {
            warn!("stopping feed: {e:#}");
            break;
        }
    }
}
