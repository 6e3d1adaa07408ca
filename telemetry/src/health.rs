//! `/health` readiness data: whether the process is up and, roughly, how
//! long it has been running. The authorization core has no database to
//! ping, so readiness here is equivalent to liveness.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

/// Tracks process start time. One instance, created at boot and shared
/// behind an `Arc` with every handler that needs it.
pub struct HealthMonitor {
    started_at: Instant,
    started_at_wall: DateTime<Utc>,
}

impl HealthMonitor {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            started_at_wall: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok",
            uptime_seconds: self.started_at.elapsed().as_secs(),
            started_at: self.started_at_wall,
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::start()
    }
}
