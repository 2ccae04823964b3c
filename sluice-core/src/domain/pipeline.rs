//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;
use super::job::{JobStatus, PipelineJob};

/// One triggered run of a repository's pipeline definition
///
/// Created by the trigger service; its status is aggregated from its jobs
/// except when the pipeline is canceled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub status: PipelineStatus,
    pub source: PipelineSource,
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// May be empty, meaning "resolve `ref` at read time"
    pub commit_sha: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Jobs in creation order
    #[serde(default)]
    pub jobs: Vec<PipelineJob>,
}

impl Pipeline {
    /// The revision the definition file is read at: the commit when known, the ref otherwise
    pub fn revision(&self) -> &str {
        if self.commit_sha.trim().is_empty() {
            &self.ref_name
        } else {
            &self.commit_sha
        }
    }

    /// Copy whose jobs have secret values hidden, see [`PipelineJob::redacted`]
    pub fn redacted(&self, secrets: &[String]) -> Self {
        Self {
            jobs: self.jobs.iter().map(|job| job.redacted(secrets)).collect(),
            ..self.clone()
        }
    }
}

/// Pipeline lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Queued => "queued",
            PipelineStatus::Running => "running",
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded | PipelineStatus::Failed | PipelineStatus::Canceled
        )
    }

    /// Derive the final status of a pipeline from its jobs
    ///
    /// Returns `None` while any job is still queued or running, or when there
    /// are no jobs at all. A failed job marked `allow_failure` counts as passed.
    pub fn aggregate(jobs: &[PipelineJob]) -> Option<PipelineStatus> {
        if jobs.is_empty() || jobs.iter().any(|job| !job.status.is_terminal()) {
            return None;
        }

        let passed = jobs.iter().all(|job| match job.status {
            JobStatus::Succeeded => true,
            JobStatus::Failed => job.allow_failure,
            _ => false,
        });

        Some(if passed {
            PipelineStatus::Succeeded
        } else {
            PipelineStatus::Failed
        })
    }

    /// The status a pipeline should move to after its jobs changed, if any
    ///
    /// Canceled pipelines never move. A queued pipeline becomes running once
    /// any job has started; once every job is terminal, the aggregate decides.
    pub fn reconcile(self, jobs: &[PipelineJob]) -> Option<PipelineStatus> {
        if self == PipelineStatus::Canceled {
            return None;
        }

        let next = match PipelineStatus::aggregate(jobs) {
            Some(done) => done,
            None if self == PipelineStatus::Queued
                && jobs.iter().any(|job| job.status != JobStatus::Queued) =>
            {
                PipelineStatus::Running
            }
            None => return None,
        };

        (next != self).then_some(next)
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(PipelineStatus::Queued),
            "running" => Ok(PipelineStatus::Running),
            "succeeded" | "success" => Ok(PipelineStatus::Succeeded),
            "failed" => Ok(PipelineStatus::Failed),
            "canceled" | "cancelled" => Ok(PipelineStatus::Canceled),
            _ => Err(UnknownVariant::new("pipeline status", s)),
        }
    }
}

/// What caused a pipeline to be triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineSource {
    #[default]
    Push,
    Schedule,
    Manual,
    Webhook,
}

impl PipelineSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineSource::Push => "push",
            PipelineSource::Schedule => "schedule",
            PipelineSource::Manual => "manual",
            PipelineSource::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for PipelineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(PipelineSource::Push),
            "schedule" => Ok(PipelineSource::Schedule),
            "manual" => Ok(PipelineSource::Manual),
            "webhook" => Ok(PipelineSource::Webhook),
            _ => Err(UnknownVariant::new("pipeline source", s)),
        }
    }
}
