//! Helper checks and runner setup for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use guardia_runner::check::{Check, CheckError, CheckId, SenderStats};
use guardia_runner::hostname::SystemHostname;
use guardia_runner::runner::store::StatsStore;
use guardia_runner::runner::{RunnerConfig, RunnerDeps, RunnerHandle};
use guardia_runner::sender::{
    BroadcastSender, SenderProvider, ServiceCheckEvent, StaticSenderProvider,
};
use tokio::sync::broadcast;

pub const TEST_HOSTNAME: &str = "test-host";

/// What a [`TestCheck`] run ends with
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok,
    Warn(&'static str),
    Fail(&'static str),
    /// Panics when asked for warnings, after the run itself completed
    PanicInWarnings,
}

/// Check with a scripted outcome that tracks how often it ran concurrently
pub struct TestCheck {
    pub id: CheckId,
    pub interval: Duration,
    pub run_time: Duration,
    pub outcome: Outcome,
    pub runs: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl TestCheck {
    pub fn new(id: &str, outcome: Outcome) -> Self {
        Self {
            id: CheckId::from(id),
            interval: Duration::from_secs(15),
            run_time: Duration::ZERO,
            outcome,
            runs: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn slow(mut self, run_time: Duration) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn long_running(mut self) -> Self {
        self.interval = Duration::ZERO;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Check for TestCheck {
    fn id(&self) -> CheckId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.id.group().to_string()
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<(), CheckError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);

        if !self.run_time.is_zero() {
            tokio::time::sleep(self.run_time).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.outcome {
            Outcome::Fail(msg) => Err(CheckError::new(msg)),
            _ => Ok(()),
        }
    }

    fn warnings(&self) -> Vec<CheckError> {
        match self.outcome {
            Outcome::Warn(msg) => vec![CheckError::new(msg)],
            Outcome::PanicInWarnings => panic!("warnings unavailable"),
            _ => vec![],
        }
    }

    fn sender_stats(&self) -> anyhow::Result<SenderStats> {
        Ok(SenderStats {
            metric_samples: 1,
            ..SenderStats::default()
        })
    }
}

pub fn spawn_runner_with_provider(
    workers: usize,
    sender_provider: Arc<dyn SenderProvider>,
) -> RunnerHandle {
    RunnerHandle::spawn(
        RunnerConfig {
            workers,
            ..RunnerConfig::default()
        },
        RunnerDeps {
            store: Arc::new(StatsStore::new()),
            sender_provider,
            hostname: Arc::new(SystemHostname::new(Some(TEST_HOSTNAME.to_string()))),
            should_add_check_stats: Arc::new(|_: &CheckId| true),
        },
    )
}

/// Runner whose service checks are published on the returned channel
pub fn spawn_runner(workers: usize) -> (RunnerHandle, broadcast::Receiver<ServiceCheckEvent>) {
    let (event_tx, event_rx) = broadcast::channel(1024);
    let sender = Arc::new(BroadcastSender::new(event_tx));

    (
        spawn_runner_with_provider(workers, Arc::new(StaticSenderProvider::new(sender))),
        event_rx,
    )
}

/// Drain everything published so far
pub fn collect_events(rx: &mut broadcast::Receiver<ServiceCheckEvent>) -> Vec<ServiceCheckEvent> {
    let mut events = vec![];
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
