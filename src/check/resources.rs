//! Host resource check
//!
//! Samples average CPU usage and memory usage of the host and raises a
//! warning for every configured limit that is exceeded.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sysinfo::System;
use tracing::{instrument, trace};

use crate::config::ResourcesCheckConfig;

use super::{Check, CheckError, CheckId, SenderStats};

/// One reading of host resources, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    pub cpu_usage: f32,
    pub memory_usage: f32,
}

impl ResourceSample {
    /// Take a reading; blocks for the minimum CPU update interval
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let cpus = sys.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let memory_usage = if sys.total_memory() == 0 {
            0.0
        } else {
            sys.used_memory() as f32 / sys.total_memory() as f32 * 100.0
        };

        Self {
            cpu_usage,
            memory_usage,
        }
    }
}

/// Warnings for every limit the sample reaches or exceeds
pub fn evaluate_limits(
    sample: &ResourceSample,
    cpu_limit: Option<f32>,
    memory_limit: Option<f32>,
) -> Vec<CheckError> {
    let mut warnings = vec![];

    if let Some(limit) = cpu_limit
        && sample.cpu_usage >= limit
    {
        warnings.push(CheckError::new(format!(
            "cpu usage {:.1}% exceeds limit of {limit}%",
            sample.cpu_usage
        )));
    }

    if let Some(limit) = memory_limit
        && sample.memory_usage >= limit
    {
        warnings.push(CheckError::new(format!(
            "memory usage {:.1}% exceeds limit of {limit}%",
            sample.memory_usage
        )));
    }

    warnings
}

#[derive(Debug, Default)]
struct LastRun {
    sample: Option<ResourceSample>,
    warnings: Vec<CheckError>,
}

pub struct ResourceCheck {
    id: CheckId,
    config: ResourcesCheckConfig,
    last_run: Mutex<LastRun>,
}

impl ResourceCheck {
    pub fn new(config: ResourcesCheckConfig) -> Self {
        Self {
            id: CheckId::new("resources", &config.name),
            config,
            last_run: Mutex::new(LastRun::default()),
        }
    }

    pub fn last_sample(&self) -> Option<ResourceSample> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sample
    }
}

#[async_trait]
impl Check for ResourceCheck {
    fn id(&self) -> CheckId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.id.group().to_string()
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval)
    }

    #[instrument(skip(self), fields(check = %self.id))]
    async fn run(&self) -> Result<(), CheckError> {
        let sample = tokio::task::spawn_blocking(ResourceSample::collect)
            .await
            .context("resource sampling task failed")?;

        trace!("sampled resources: {sample:?}");

        let warnings = evaluate_limits(&sample, self.config.cpu_limit, self.config.memory_limit);

        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = LastRun {
            sample: Some(sample),
            warnings,
        };

        Ok(())
    }

    fn warnings(&self) -> Vec<CheckError> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .warnings
            .clone()
    }

    fn sender_stats(&self) -> anyhow::Result<SenderStats> {
        let sampled = self.last_sample().is_some();
        Ok(SenderStats {
            metric_samples: if sampled { 2 } else { 0 },
            ..SenderStats::default()
        })
    }
}
