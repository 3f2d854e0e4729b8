//! API shared state

use crate::runner::RunnerHandle;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Handle to the runner whose stats are exposed
    pub runner: RunnerHandle,
}

impl ApiState {
    pub fn new(runner: RunnerHandle) -> Self {
        Self { runner }
    }
}
