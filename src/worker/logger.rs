//! Check lifecycle logging with adaptive throttling
//!
//! A freshly observed check logs its lifecycle at `info` for its first few
//! runs, then only once every `logging_frequency` runs. In between, the same
//! lines go out at `debug`.

use tracing::{debug, error, info};

use crate::check::stats::RuntimeAggregate;
use crate::check::{CheckError, CheckId};
use crate::config::LoggingFrequency;
use crate::runner::store::StatsStore;

/// Number of initial runs that are always logged verbosely
pub const INITIAL_CHECK_LOGGING_SERIES_LIMIT: u64 = 5;

/// Outcome of [`should_log_check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDecision {
    pub should_log: bool,
    /// Last run of the initial verbose series
    pub is_burst_end: bool,
}

/// Decide whether the lifecycle of `id` should be logged verbosely
///
/// Uses the run count recorded in the store, zero if the check has no stats yet.
pub fn should_log_check<A: RuntimeAggregate>(
    store: &StatsStore<A>,
    id: &CheckId,
    frequency: LoggingFrequency,
) -> LogDecision {
    let runs = store.stats(id).map_or(0, |stats| stats.total_runs());

    LogDecision {
        should_log: runs <= INITIAL_CHECK_LOGGING_SERIES_LIMIT || runs % frequency.get() == 0,
        is_burst_end: runs == INITIAL_CHECK_LOGGING_SERIES_LIMIT,
    }
}

/// Logs lifecycle lines for one check
pub struct CheckLogger<'a, A> {
    id: &'a CheckId,
    store: &'a StatsStore<A>,
    frequency: LoggingFrequency,
}

impl<'a, A: RuntimeAggregate> CheckLogger<'a, A> {
    pub fn new(id: &'a CheckId, store: &'a StatsStore<A>, frequency: LoggingFrequency) -> Self {
        Self {
            id,
            store,
            frequency,
        }
    }

    pub fn debug(&self, message: &str) {
        debug!(check = %self.id, "{message}");
    }

    pub fn error(&self, err: &CheckError) {
        error!(check = %self.id, "Error running check: {err}");
    }

    pub fn check_started(&self) {
        let decision = should_log_check(self.store, self.id, self.frequency);

        if decision.should_log {
            info!(check = %self.id, "Running check...");
        } else {
            debug!(check = %self.id, "Running check...");
        }
    }

    pub fn check_finished(&self) {
        let decision = should_log_check(self.store, self.id, self.frequency);

        let mut message = String::from("Done running check");
        if decision.is_burst_end {
            message.push_str(&format!(
                ", next runs will be logged every {} runs",
                self.frequency
            ));
        }

        if decision.should_log {
            info!(check = %self.id, "{message}");
        } else {
            debug!(check = %self.id, "{message}");
        }
    }
}
