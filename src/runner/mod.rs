//! Runner - a bounded pool of workers draining one shared check queue
//!
//! ```text
//!   scheduler ──schedule()──→ [ pending queue (MPMC) ]
//!                                  │    │    │
//!                              worker worker worker ──→ StatsStore / Sender
//! ```
//!
//! The runner owns the queue, the running-checks tracker and the worker
//! tasks. The stats store is created by the caller and shared with the
//! status API.

pub mod store;
pub mod tracker;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::check::stats::{CheckStats, RuntimeAggregate};
use crate::check::{Check, CheckId};
use crate::config::LoggingFrequency;
use crate::hostname::HostnameResolver;
use crate::sender::SenderProvider;
use crate::worker::{ShouldAddCheckStatsFn, Worker, WorkerContext};

use store::{RunnerStatus, StatsStore};
use tracker::RunningChecksTracker;

/// Sizing of a runner
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub id: usize,
    pub workers: usize,
    pub queue_capacity: usize,
    pub logging_frequency: LoggingFrequency,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            id: 0,
            workers: 4,
            queue_capacity: 100,
            logging_frequency: LoggingFrequency::default(),
        }
    }
}

/// External collaborators the workers depend on
pub struct RunnerDeps<A = CheckStats> {
    pub store: Arc<StatsStore<A>>,
    pub sender_provider: Arc<dyn SenderProvider>,
    pub hostname: Arc<dyn HostnameResolver>,
    pub should_add_check_stats: ShouldAddCheckStatsFn,
}

/// Counts one worker in the `Workers` counter for as long as it is alive
struct WorkerSlot<A: RuntimeAggregate> {
    store: Arc<StatsStore<A>>,
}

impl<A: RuntimeAggregate> WorkerSlot<A> {
    fn acquire(store: Arc<StatsStore<A>>) -> Self {
        store.counters().adjust_workers(1);
        Self { store }
    }
}

impl<A: RuntimeAggregate> Drop for WorkerSlot<A> {
    fn drop(&mut self) {
        self.store.counters().adjust_workers(-1);
    }
}

/// Handle for scheduling checks onto a running worker pool
///
/// Cloning the handle shares the same pool. The pool stops once [`stop`] is
/// called; scheduling afterwards fails.
///
/// [`stop`]: RunnerHandle::stop
pub struct RunnerHandle<A = CheckStats> {
    id: usize,
    pending_tx: Arc<Mutex<Option<mpsc::Sender<Arc<dyn Check>>>>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    store: Arc<StatsStore<A>>,
}

impl<A> Clone for RunnerHandle<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            pending_tx: self.pending_tx.clone(),
            workers: self.workers.clone(),
            store: self.store.clone(),
        }
    }
}

impl<A: RuntimeAggregate> RunnerHandle<A> {
    /// Spawn `config.workers` workers sharing one queue
    pub fn spawn(config: RunnerConfig, deps: RunnerDeps<A>) -> Self {
        let (pending_tx, pending_rx) = mpsc::channel(config.queue_capacity.max(1));
        let pending = Arc::new(Mutex::new(pending_rx));

        let ctx = WorkerContext {
            store: deps.store.clone(),
            tracker: Arc::new(RunningChecksTracker::new()),
            sender_provider: deps.sender_provider,
            hostname: deps.hostname,
            should_add_check_stats: deps.should_add_check_stats,
            logging_frequency: config.logging_frequency,
        };

        let handles = (0..config.workers)
            .map(|worker_id| {
                let worker = Worker::new(worker_id, config.id, pending.clone(), ctx.clone());
                let slot = WorkerSlot::acquire(deps.store.clone());

                tokio::spawn(async move {
                    let _slot = slot;
                    worker.run().await;
                })
            })
            .collect();

        info!(
            "runner {} started with {} workers",
            config.id, config.workers
        );

        Self {
            id: config.id,
            pending_tx: Arc::new(Mutex::new(Some(pending_tx))),
            workers: Arc::new(Mutex::new(handles)),
            store: deps.store,
        }
    }

    async fn sender(&self) -> Result<mpsc::Sender<Arc<dyn Check>>> {
        self.pending_tx
            .lock()
            .await
            .clone()
            .context("runner is stopped")
    }

    /// Enqueue a check, waiting for queue capacity
    pub async fn schedule(&self, check: Arc<dyn Check>) -> Result<()> {
        self.sender()
            .await?
            .send(check)
            .await
            .map_err(|_| anyhow::anyhow!("check queue is closed"))
    }

    /// Enqueue a check, failing if the queue is full
    pub async fn try_schedule(&self, check: Arc<dyn Check>) -> Result<()> {
        self.sender()
            .await?
            .try_send(check)
            .map_err(|e| anyhow::anyhow!("failed to enqueue check: {e}"))
    }

    /// Close the queue and wait for every worker to finish its current check
    pub async fn stop(&self) {
        debug!("stopping runner {}", self.id);

        // Workers exit once the last sender is gone and the queue is drained.
        self.pending_tx.lock().await.take();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("worker of runner {} exited abnormally: {e}", self.id);
            }
        }

        info!("runner {} stopped", self.id);
    }

    pub fn remove_check_stats(&self, id: &CheckId) {
        self.store.remove_stats(id);
    }

    pub fn store(&self) -> &Arc<StatsStore<A>> {
        &self.store
    }

    pub fn status(&self) -> RunnerStatus<A> {
        self.store.status()
    }
}
