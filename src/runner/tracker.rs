//! Tracks which checks are currently executing
//!
//! Registration is a single test-and-set under one lock, so two workers can
//! never both win the right to run the same identifier.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::check::CheckId;

#[derive(Debug, Default)]
pub struct RunningChecksTracker {
    in_flight: Mutex<HashSet<CheckId>>,
}

impl RunningChecksTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim exclusive execution rights for `id`
    ///
    /// Returns `false` (and changes nothing) if another worker already holds them.
    pub fn register(&self, id: &CheckId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone())
    }

    /// Release execution rights for `id`; no-op if not held
    pub fn unregister(&self, id: &CheckId) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn is_running(&self, id: &CheckId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Copy of the identifiers currently in flight
    pub fn running(&self) -> Vec<CheckId> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
