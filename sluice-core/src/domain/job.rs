//! Job domain types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;
use crate::env::JobEnv;

/// One schedulable unit of work belonging to a pipeline
///
/// Structure shared between orchestrator (persists) and its clients (display, execution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    /// Unique within the pipeline only
    pub name: String,
    /// Declaration index of the job template in the definition file
    pub position: u32,
    pub image: Option<String>,
    /// Pre-script and job script, newline-joined
    pub script: String,
    pub status: JobStatus,
    pub when_type: WhenType,
    pub is_manual: bool,
    pub allow_failure: bool,
    /// Delay relative to `created_at`, only meaningful for delayed jobs
    pub start_after_seconds: Option<u32>,
    /// The rule expression that produced the when-type (diagnostic only)
    pub rule: Option<String>,
    pub manual_released: bool,
    pub timeout_seconds: Option<u32>,
    pub env: JobEnv,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineJob {
    /// A fresh queued job with no script, image or environment
    pub fn queued(pipeline_id: Uuid, name: impl Into<String>, when_type: WhenType) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            name: name.into(),
            position: 0,
            image: None,
            script: String::new(),
            status: JobStatus::Queued,
            when_type,
            is_manual: when_type == WhenType::Manual,
            allow_failure: false,
            start_after_seconds: None,
            rule: None,
            manual_released: false,
            timeout_seconds: None,
            env: JobEnv::new(),
            exit_code: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Copy for read endpoints, with secret values hidden in the environment
    ///
    /// Only the lease payload carries the real values.
    pub fn redacted(&self, secrets: &[String]) -> Self {
        Self {
            env: self.env.masked(secrets),
            ..self.clone()
        }
    }

    /// Earliest instant a delayed job may be leased
    pub fn available_at(&self) -> DateTime<Utc> {
        match (self.when_type, self.start_after_seconds) {
            (WhenType::Delayed, Some(secs)) => self.created_at + Duration::seconds(i64::from(secs)),
            _ => self.created_at,
        }
    }

    /// Whether the lease broker may hand this job to a runner at `now`
    ///
    /// Manual jobs need an explicit release; delayed jobs wait until
    /// `created_at + start_after_seconds`.
    pub fn is_leasable(&self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        if self.when_type == WhenType::Manual && !self.manual_released {
            return false;
        }
        if self.when_type == WhenType::Delayed && now < self.available_at() {
            return false;
        }
        true
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Statuses that cancellation moves to `Canceled`
    pub fn is_cancelable(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    /// Accepts the runner spellings `success` and `cancelled` as well
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" | "success" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" | "cancelled" => Ok(JobStatus::Canceled),
            _ => Err(UnknownVariant::new("job status", s)),
        }
    }
}

/// Policy governing if and when a job becomes eligible for leasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenType {
    #[default]
    OnSuccess,
    Manual,
    Delayed,
    Never,
    OnFailure,
}

impl WhenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhenType::OnSuccess => "on_success",
            WhenType::Manual => "manual",
            WhenType::Delayed => "delayed",
            WhenType::Never => "never",
            WhenType::OnFailure => "on_failure",
        }
    }

    /// Map a rule's `when` keyword; anything unrecognised runs on success
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "manual" => WhenType::Manual,
            "delayed" => WhenType::Delayed,
            "never" => WhenType::Never,
            "on_failure" => WhenType::OnFailure,
            _ => WhenType::OnSuccess,
        }
    }
}

impl std::fmt::Display for WhenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhenType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_success" => Ok(WhenType::OnSuccess),
            "manual" => Ok(WhenType::Manual),
            "delayed" => Ok(WhenType::Delayed),
            "never" => Ok(WhenType::Never),
            "on_failure" => Ok(WhenType::OnFailure),
            _ => Err(UnknownVariant::new("when type", s)),
        }
    }
}
