//! Worker - executes checks pulled from the shared queue
//!
//! Each worker is a long-lived task. Workers are symmetric: they all drain the
//! same queue and any of them may run any check.
//!
//! ## Per-check flow
//!
//! ```text
//! dequeue → tracker.register ─(taken)→ skip
//!                │
//!                ↓
//!       run check (running map set/cleared)
//!                │
//!                ↓
//!   status: OK / WARNING / CRITICAL → service check (periodic checks only)
//!                │
//!                ↓
//!   tracker.unregister → counters → fold stats (if still scheduled)
//! ```
//!
//! A worker stops once the queue is closed and drained. In-flight checks always
//! run to completion.

pub mod logger;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, instrument, warn};

use crate::check::stats::{CheckStats, RuntimeAggregate};
use crate::check::{Check, CheckError, CheckId, SenderStats};
use crate::config::LoggingFrequency;
use crate::hostname::HostnameResolver;
use crate::runner::store::{RunnerCounters, StatsStore};
use crate::runner::tracker::RunningChecksTracker;
use crate::sender::{CHECK_STATUS_SERVICE_CHECK, SenderProvider, ServiceCheckStatus};

use logger::CheckLogger;

/// Queue shared by all workers of a runner
pub type PendingChecks = Arc<Mutex<mpsc::Receiver<Arc<dyn Check>>>>;

/// Whether stats of a check should still be recorded (i.e. it is still scheduled)
pub type ShouldAddCheckStatsFn = Arc<dyn Fn(&CheckId) -> bool + Send + Sync>;

/// Everything a worker shares with the rest of the runner
pub struct WorkerContext<A = CheckStats> {
    pub store: Arc<StatsStore<A>>,
    pub tracker: Arc<RunningChecksTracker>,
    pub sender_provider: Arc<dyn SenderProvider>,
    pub hostname: Arc<dyn HostnameResolver>,
    pub should_add_check_stats: ShouldAddCheckStatsFn,
    pub logging_frequency: LoggingFrequency,
}

impl<A> Clone for WorkerContext<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tracker: self.tracker.clone(),
            sender_provider: self.sender_provider.clone(),
            hostname: self.hostname.clone(),
            should_add_check_stats: self.should_add_check_stats.clone(),
            logging_frequency: self.logging_frequency,
        }
    }
}

/// What happened to a dequeued check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another worker was already running it
    Skipped,
    Completed { status: ServiceCheckStatus },
}

/// Registration of a check in the tracker and the running-checks counter
///
/// Released explicitly once the run is over, or on drop if the pipeline
/// unwinds before that.
struct InFlight<'a> {
    tracker: &'a RunningChecksTracker,
    counters: &'a RunnerCounters,
    id: &'a CheckId,
    released: bool,
}

impl<'a> InFlight<'a> {
    fn new(tracker: &'a RunningChecksTracker, counters: &'a RunnerCounters, id: &'a CheckId) -> Self {
        counters.adjust_running_checks(1);
        Self {
            tracker,
            counters,
            id,
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.tracker.unregister(self.id);
        self.counters.adjust_running_checks(-1);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Releasing check {} after an interrupted run", self.id);
            self.release();
        }
    }
}

pub struct Worker<A = CheckStats> {
    id: usize,
    runner_id: usize,
    pending: PendingChecks,
    ctx: WorkerContext<A>,
}

impl<A: RuntimeAggregate> Worker<A> {
    pub fn new(id: usize, runner_id: usize, pending: PendingChecks, ctx: WorkerContext<A>) -> Self {
        Self {
            id,
            runner_id,
            pending,
            ctx,
        }
    }

    /// Process checks until the queue is closed
    #[instrument(skip(self), fields(runner = self.runner_id, worker = self.id))]
    pub async fn run(self) {
        debug!(
            "Runner {}, worker {}: Ready to process checks...",
            self.runner_id, self.id
        );

        while let Some(check) = self.next_check().await {
            let id = check.id();
            if AssertUnwindSafe(self.process(check)).catch_unwind().await.is_err() {
                error!("Check {id} panicked outside of its run, it has been released");
            }
        }

        debug!(
            "Runner {}, worker {}: Finished processing checks.",
            self.runner_id, self.id
        );
    }

    async fn next_check(&self) -> Option<Arc<dyn Check>> {
        self.pending.lock().await.recv().await
    }

    /// Run a single check through the whole pipeline
    pub async fn process(&self, check: Arc<dyn Check>) -> RunOutcome {
        let ctx = &self.ctx;
        let counters = ctx.store.counters();
        let id = check.id();
        let check_logger = CheckLogger::new(&id, &ctx.store, ctx.logging_frequency);

        if !ctx.tracker.register(&id) {
            check_logger.debug("Check is already running, skipping execution...");
            return RunOutcome::Skipped;
        }

        let mut in_flight = InFlight::new(&ctx.tracker, counters, &id);
        check_logger.check_started();

        let started = Instant::now();
        ctx.store.set_running(&id, Utc::now());
        let result = match AssertUnwindSafe(check.run()).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(CheckError::new("check panicked")),
        };
        ctx.store.clear_running(&id);

        let long_running = check.interval().is_zero();
        let warnings = check.warnings();

        let sender = match ctx.sender_provider.default_sender() {
            Ok(sender) => Some(sender),
            Err(e) => {
                error!("Error getting default sender: {e}. Not sending status check for {id}");
                None
            }
        };

        let mut status = ServiceCheckStatus::Ok;
        if !warnings.is_empty() {
            status = ServiceCheckStatus::Warning;
        }
        if let Err(err) = &result {
            check_logger.error(err);
            status = ServiceCheckStatus::Critical;
        }

        if let Some(sender) = sender
            && !long_running
        {
            let tags = vec![format!("check:{}", check.name())];
            let hostname = ctx.hostname.hostname();
            sender.service_check(CHECK_STATUS_SERVICE_CHECK, status, &hostname, &tags, "");
            sender.commit();
        }

        in_flight.release();

        counters.adjust_runs(1);
        if !warnings.is_empty() {
            counters.adjust_warnings(warnings.len() as i64);
        }
        let error = result.err();
        if error.is_some() {
            counters.adjust_errors(1);
        }

        if (!long_running || !warnings.is_empty() || error.is_some())
            && (ctx.should_add_check_stats)(&id)
        {
            let sender_stats = check.sender_stats().unwrap_or_else(|e| {
                debug!("unable to get sender stats for {id}: {e:#}");
                SenderStats::default()
            });
            ctx.store.fold_run_stats(
                &id,
                started.elapsed(),
                error.as_ref(),
                &warnings,
                sender_stats,
            );
        }

        check_logger.check_finished();

        RunOutcome::Completed { status }
    }
}
