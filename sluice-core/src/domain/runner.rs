//! Runner domain model
//!
//! Represents an external execution agent that polls the orchestrator for jobs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A runner is considered offline once it has not polled for this long
pub const HEARTBEAT_TIMEOUT_SECS: i64 = 60;

/// A runner known to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    pub id: Uuid,

    /// Display name supplied by the runner
    pub name: String,

    /// SHA-256 hex digest of the runner's token; the token itself is never stored
    #[serde(skip_serializing, default)]
    pub token_hash: String,

    /// Capability tags; stored but not used for job matching
    pub tags: Vec<String>,

    pub active: bool,

    /// Last time this runner polled for work
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl Runner {
    pub fn status(&self, now: DateTime<Utc>) -> RunnerStatus {
        match self.last_heartbeat_at {
            Some(seen) if self.active && now - seen <= Duration::seconds(HEARTBEAT_TIMEOUT_SECS) => {
                RunnerStatus::Online
            }
            _ => RunnerStatus::Offline,
        }
    }
}

/// Status of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerStatus {
    /// Runner polled recently
    Online,

    /// Runner hasn't polled recently, or was deactivated
    Offline,
}

impl std::fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerStatus::Online => write!(f, "Online"),
            RunnerStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Split the comma-separated tag column into trimmed, non-empty tags
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(seen: Option<DateTime<Utc>>) -> Runner {
        Runner {
            id: Uuid::new_v4(),
            name: "builder-1".to_string(),
            token_hash: String::new(),
            tags: vec![],
            active: true,
            last_heartbeat_at: seen,
        }
    }

    #[test]
    fn test_status_follows_heartbeat() {
        let now = Utc::now();
        assert_eq!(runner(Some(now)).status(now), RunnerStatus::Online);
        assert_eq!(
            runner(Some(now - Duration::seconds(120))).status(now),
            RunnerStatus::Offline
        );
        assert_eq!(runner(None).status(now), RunnerStatus::Offline);
    }

    #[test]
    fn test_tags_round_trip_through_column() {
        let tags = parse_tags(" docker, linux ,,arm64");
        assert_eq!(tags, vec!["docker", "linux", "arm64"]);
        assert_eq!(join_tags(&tags), "docker,linux,arm64");
        assert!(parse_tags("").is_empty());
    }
}
