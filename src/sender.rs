//! Service check submission
//!
//! Workers report one service check per run through the default [`Sender`].
//! The sender is resolved on every run through a [`SenderProvider`]; a
//! provider failure only skips the service check, never the run.
//!
//! [`BroadcastSender`] buffers service checks and publishes them as
//! [`ServiceCheckEvent`]s on a broadcast channel once committed, so any number
//! of consumers can subscribe.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Name of the service check reporting each run's outcome
pub const CHECK_STATUS_SERVICE_CHECK: &str = "guardia.runner.check_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCheckStatus {
    Ok,
    Warning,
    Critical,
}

/// A committed service check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheckEvent {
    pub name: String,
    pub status: ServiceCheckStatus,
    pub hostname: String,
    pub tags: Vec<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Errors returned when resolving a sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderError {
    /// No default sender has been set up
    Unavailable(String),
}

impl fmt::Display for SenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderError::Unavailable(msg) => write!(f, "sender unavailable: {msg}"),
        }
    }
}

impl std::error::Error for SenderError {}

pub trait Sender: Send + Sync {
    fn service_check(
        &self,
        name: &str,
        status: ServiceCheckStatus,
        hostname: &str,
        tags: &[String],
        message: &str,
    );

    /// Flush everything submitted since the last commit
    fn commit(&self);
}

pub trait SenderProvider: Send + Sync {
    fn default_sender(&self) -> Result<Arc<dyn Sender>, SenderError>;
}

/// Sender publishing committed service checks on a broadcast channel
pub struct BroadcastSender {
    pending: Mutex<Vec<ServiceCheckEvent>>,
    event_tx: broadcast::Sender<ServiceCheckEvent>,
}

impl BroadcastSender {
    pub fn new(event_tx: broadcast::Sender<ServiceCheckEvent>) -> Self {
        Self {
            pending: Mutex::new(vec![]),
            event_tx,
        }
    }
}

impl Sender for BroadcastSender {
    fn service_check(
        &self,
        name: &str,
        status: ServiceCheckStatus,
        hostname: &str,
        tags: &[String],
        message: &str,
    ) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ServiceCheckEvent {
                name: name.to_string(),
                status,
                hostname: hostname.to_string(),
                tags: tags.to_vec(),
                message: message.to_string(),
                timestamp: Utc::now(),
            });
    }

    fn commit(&self) {
        let pending = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for event in pending {
            // No subscribers is fine, the event is simply dropped.
            match self.event_tx.send(event) {
                Ok(num_receivers) => trace!("published service check to {num_receivers} receivers"),
                Err(_) => trace!("no receivers for service check"),
            }
        }
    }
}

/// Hands out the same sender on every call
pub struct StaticSenderProvider {
    sender: Option<Arc<dyn Sender>>,
}

impl StaticSenderProvider {
    pub fn new(sender: Arc<dyn Sender>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Provider that never has a sender
    pub fn unavailable() -> Self {
        Self { sender: None }
    }
}

impl SenderProvider for StaticSenderProvider {
    fn default_sender(&self) -> Result<Arc<dyn Sender>, SenderError> {
        self.sender
            .clone()
            .ok_or_else(|| SenderError::Unavailable("no default sender configured".to_string()))
    }
}
