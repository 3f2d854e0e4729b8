//! API response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` while at least one worker is alive, `stopped` otherwise
    pub status: String,
    pub workers: i64,
    pub running_checks: i64,
    pub timestamp: DateTime<Utc>,
}
