//! Runner DTOs
//!
//! Data transfer objects for runner-related operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::runner::{Runner, RunnerStatus};

/// Summary information about a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSummary {
    pub id: Uuid,

    pub name: String,

    /// Capability tags the runner advertised
    pub tags: Vec<String>,

    pub active: bool,

    /// Last time this runner polled for work
    pub last_heartbeat_at: Option<DateTime<Utc>>,

    /// Derived from the heartbeat at listing time
    pub status: RunnerStatus,
}

impl RunnerSummary {
    pub fn from_runner(runner: Runner, now: DateTime<Utc>) -> Self {
        let status = runner.status(now);
        RunnerSummary {
            id: runner.id,
            name: runner.name,
            tags: runner.tags,
            active: runner.active,
            last_heartbeat_at: runner.last_heartbeat_at,
            status,
        }
    }
}
