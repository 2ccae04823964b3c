//! Lease Service
//!
//! Hands queued jobs to polling runners. Selection and the `queued -> running`
//! transition happen atomically inside the ledger, so concurrent polls never
//! receive the same job. An empty queue is a normal answer, not an error.

use chrono::{DateTime, Utc};
use sluice_core::domain::job::JobStatus;
use sluice_core::dto::job::{JobEventKind, LeaseRequest, LeaseResponse, ReleaseResponse};
use uuid::Uuid;

use crate::notify::{NotificationSink, notify};
use crate::repository::{Ledger, LedgerError};
use crate::service::runner::{self, RunnerError};

/// Service error type
#[derive(Debug)]
pub enum LeaseError {
    NotFound(Uuid),
    ValidationError(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for LeaseError {
    fn from(err: LedgerError) -> Self {
        LeaseError::Ledger(err)
    }
}

impl From<RunnerError> for LeaseError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::ValidationError(msg) => LeaseError::ValidationError(msg),
            RunnerError::Ledger(err) => LeaseError::Ledger(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, LeaseError>;

/// Lease the oldest eligible job, if any
///
/// A poll carrying a runner token also refreshes that runner's heartbeat.
/// Polls without a token are served anonymously.
pub async fn lease_job(
    ledger: &dyn Ledger,
    sink: &dyn NotificationSink,
    token: Option<&str>,
    req: LeaseRequest,
    now: DateTime<Utc>,
) -> Result<LeaseResponse> {
    let runner = match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => Some(runner::record_poll(ledger, token, &req, now).await?),
        None => None,
    };

    let Some(job) = ledger.claim_next_job(now).await? else {
        return Ok(LeaseResponse::empty(now));
    };

    match &runner {
        Some(runner) => tracing::info!(
            "Job {} ({}) leased to runner {}",
            job.id,
            job.name,
            runner.id
        ),
        None => tracing::info!("Job {} ({}) leased to anonymous runner", job.id, job.name),
    }
    notify(sink, job.id, JobEventKind::Status, JobStatus::Running.as_str());

    Ok(LeaseResponse::for_job(job, now))
}

/// Release a manual job so the next poll may lease it
///
/// Idempotent; releasing a job that is not manual only sets the flag.
pub async fn release_manual(ledger: &dyn Ledger, job_id: Uuid) -> Result<ReleaseResponse> {
    let job = ledger
        .release_manual(job_id)
        .await?
        .ok_or(LeaseError::NotFound(job_id))?;

    tracing::info!("Manual job {} ({}) released", job.id, job.name);

    Ok(ReleaseResponse {
        id: job.id,
        status: job.status,
        manual_released: job.manual_released,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::notify::BroadcastSink;
    use crate::repository::MemoryLedger;
    use crate::service::pipeline;
    use crate::source::MemorySource;
    use chrono::Duration;
    use sluice_core::domain::pipeline::{Pipeline, PipelineSource, PipelineStatus};
    use sluice_core::dto::pipeline::TriggerPipeline;

    async fn setup(definition: &str) -> (MemoryLedger, BroadcastSink, Pipeline) {
        let ledger = MemoryLedger::new();
        let repository_id = Uuid::new_v4();
        let source = MemorySource::new().with_file(repository_id, "main", ".pm-ci.yml", definition);
        let req = TriggerPipeline {
            repository_id,
            ref_name: Some("main".to_string()),
            commit_sha: None,
            source: PipelineSource::Push,
            changed_paths: None,
        };
        let created = pipeline::trigger(&ledger, &source, &Config::default(), req)
            .await
            .unwrap();
        (ledger, BroadcastSink::new(16), created)
    }

    #[tokio::test]
    async fn test_lease_hands_out_job_once() {
        let (ledger, sink, created) = setup("jobs:\n  build:\n    image: rust:1\n    script: [\"cargo build\"]\n").await;
        let now = created.created_at;
        let mut rx = sink.subscribe();

        let leased = lease_job(&ledger, &sink, Some("tok"), LeaseRequest::default(), now)
            .await
            .unwrap();
        assert_eq!(leased.job_id, Some(created.jobs[0].id));
        assert_eq!(leased.script.as_deref(), Some("cargo build"));
        assert_eq!(leased.image.as_deref(), Some("rust:1"));
        assert!(leased.env.is_some());

        let empty = lease_job(&ledger, &sink, None, LeaseRequest::default(), now)
            .await
            .unwrap();
        assert!(empty.job_id.is_none());

        assert_eq!(rx.recv().await.unwrap().payload, "running");
        let stored = ledger.find_pipeline(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PipelineStatus::Running);
        assert_eq!(ledger.list_runners().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delayed_job_waits_for_its_offset() {
        let definition = r#"
jobs:
  later:
    rules:
      - when: delayed
        start_in: 1 minute
"#;
        let (ledger, sink, created) = setup(definition).await;
        let created_at = created.jobs[0].created_at;
        assert_eq!(created.jobs[0].start_after_seconds, Some(60));

        let early = lease_job(&ledger, &sink, None, LeaseRequest::default(), created_at)
            .await
            .unwrap();
        assert!(early.job_id.is_none());

        let on_time = created_at + Duration::seconds(61);
        let leased = lease_job(&ledger, &sink, None, LeaseRequest::default(), on_time)
            .await
            .unwrap();
        assert_eq!(leased.job_id, Some(created.jobs[0].id));
    }

    #[tokio::test]
    async fn test_manual_job_requires_release() {
        let definition = "jobs:\n  deploy:\n    rules:\n      - when: manual\n";
        let (ledger, sink, created) = setup(definition).await;
        let now = created.created_at;
        let job_id = created.jobs[0].id;

        let before = lease_job(&ledger, &sink, None, LeaseRequest::default(), now)
            .await
            .unwrap();
        assert!(before.job_id.is_none());

        let released = release_manual(&ledger, job_id).await.unwrap();
        assert!(released.manual_released);
        assert_eq!(released.status, JobStatus::Queued);
        release_manual(&ledger, job_id).await.unwrap();

        let after = lease_job(&ledger, &sink, None, LeaseRequest::default(), now)
            .await
            .unwrap();
        assert_eq!(after.job_id, Some(job_id));
    }

    #[tokio::test]
    async fn test_release_unknown_job() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            release_manual(&ledger, Uuid::new_v4()).await,
            Err(LeaseError::NotFound(_))
        ));
    }
}
