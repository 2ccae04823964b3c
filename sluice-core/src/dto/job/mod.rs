//! Job DTOs
//!
//! Bodies of the runner lease protocol, the manual-release endpoint and the
//! live job event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{JobStatus, PipelineJob};
use crate::env::JobEnv;

/// Runner poll; all fields optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Lease answer; `job_id` is `None` when no job is eligible
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseResponse {
    pub job_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<JobEnv>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    pub leased_at: DateTime<Utc>,
}

impl LeaseResponse {
    pub fn empty(leased_at: DateTime<Utc>) -> Self {
        Self {
            job_id: None,
            image: None,
            script: None,
            env: None,
            timeout_seconds: None,
            leased_at,
        }
    }

    pub fn for_job(job: PipelineJob, leased_at: DateTime<Utc>) -> Self {
        Self {
            job_id: Some(job.id),
            image: job.image,
            script: Some(job.script),
            env: Some(job.env),
            timeout_seconds: job.timeout_seconds,
            leased_at,
        }
    }
}

/// Status push from the runner executing a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
    #[serde(default, alias = "exit_code", skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Answer to a manual-job release
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub manual_released: bool,
}

/// Kind of live event published for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobEventKind {
    Log,
    Status,
}

impl JobEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventKind::Log => "log",
            JobEventKind::Status => "status",
        }
    }
}

/// One (job, event-type, payload) triple delivered to live viewers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub kind: JobEventKind,
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::WhenType;

    #[test]
    fn test_empty_lease_serializes_null_job() {
        let now = Utc::now();
        let body = serde_json::to_value(LeaseResponse::empty(now)).unwrap();
        assert!(body["jobId"].is_null());
        assert!(body.get("script").is_none());
        assert!(body.get("leasedAt").is_some());
    }

    #[test]
    fn test_lease_carries_payload() {
        let mut job = PipelineJob::queued(Uuid::new_v4(), "build", WhenType::OnSuccess);
        job.image = Some("rust:1".to_string());
        job.script = "cargo build".to_string();
        job.env.insert("CI_COMMIT_BRANCH", "main");
        let id = job.id;

        let body = serde_json::to_value(LeaseResponse::for_job(job, Utc::now())).unwrap();
        assert_eq!(body["jobId"], id.to_string());
        assert_eq!(body["image"], "rust:1");
        assert_eq!(body["script"], "cargo build");
        assert_eq!(body["env"]["CI_COMMIT_BRANCH"], "main");
    }

    #[test]
    fn test_status_update_accepts_both_exit_code_spellings() {
        let camel: StatusUpdate = serde_json::from_str(r#"{"exitCode": 2}"#).unwrap();
        let snake: StatusUpdate =
            serde_json::from_str(r#"{"status":"failed","exit_code": 1,"finished":true}"#).unwrap();
        assert_eq!(camel.exit_code, Some(2));
        assert_eq!(snake.exit_code, Some(1));
        assert_eq!(snake.finished, Some(true));
        assert_eq!(snake.status.as_deref(), Some("failed"));
    }
}
