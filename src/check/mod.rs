//! Check abstraction consumed by the runner
//!
//! A check is a unit of monitoring work with a stable identifier. The runner
//! only relies on the contract exposed by [`Check`]; what a check actually
//! measures is up to the implementation.
//!
//! ## Identifiers
//!
//! Identifiers have the form `group:instance` (e.g. `http:homepage`). The group
//! is everything before the first `:` and is used to bucket runtime stats.

pub mod http;
pub mod resources;
pub mod stats;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Separator between the group name and the instance discriminator
pub const ID_SEPARATOR: char = ':';

/// Unique identifier of a configured check instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckId(String);

impl CheckId {
    /// Build an identifier from a group name and an instance discriminator
    pub fn new(group: &str, instance: &str) -> Self {
        Self(format!("{group}{ID_SEPARATOR}{instance}"))
    }

    /// Group name of this identifier (everything before the first separator)
    ///
    /// Identifiers without a separator are their own group.
    pub fn group(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map_or(self.0.as_str(), |(group, _)| group)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CheckId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Counts of what a check submitted during its last run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderStats {
    pub metric_samples: u64,
    pub events: u64,
    pub service_checks: u64,
}

impl SenderStats {
    /// Component-wise sum, used to keep cumulative totals
    pub fn merge(&mut self, other: &SenderStats) {
        self.metric_samples += other.metric_samples;
        self.events += other.events;
        self.service_checks += other.service_checks;
    }
}

/// Failure reported by a check run or one of its warnings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError(String);

impl CheckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CheckError {}

impl From<anyhow::Error> for CheckError {
    fn from(err: anyhow::Error) -> Self {
        Self(format!("{err:#}"))
    }
}

/// A unit of monitoring work
///
/// Implementations must be `Send + Sync`: the same check instance is shared
/// between the scheduler feeding the queue and whichever worker executes it.
/// The runner never executes the same [`CheckId`] twice concurrently.
///
/// `run` may take arbitrarily long; the runner imposes no timeout. Blocking
/// implementations should move their work onto `tokio::task::spawn_blocking`.
#[async_trait]
pub trait Check: Send + Sync {
    /// Stable identifier of this instance
    fn id(&self) -> CheckId;

    /// Check name, the group of [`Check::id`]; tags service checks
    fn name(&self) -> String;

    /// Scheduling interval, `Duration::ZERO` for long-running checks
    fn interval(&self) -> Duration;

    /// Execute the check once
    async fn run(&self) -> Result<(), CheckError>;

    /// Warnings raised by the most recent run
    fn warnings(&self) -> Vec<CheckError>;

    /// What the most recent run submitted
    fn sender_stats(&self) -> anyhow::Result<SenderStats>;
}
