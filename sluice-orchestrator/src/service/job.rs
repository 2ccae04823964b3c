//! Job Service
//!
//! Status pushes from runners. Each push may change the job status, stamp the
//! finish time, record the exit code, or any mix of the three; the owning
//! pipeline's status is re-derived from its jobs inside the same ledger call.

use chrono::{DateTime, Utc};
use sluice_core::domain::job::{JobStatus, PipelineJob};
use sluice_core::dto::job::{JobEventKind, StatusUpdate};
use uuid::Uuid;

use crate::notify::{NotificationSink, notify};
use crate::repository::{JobTransition, Ledger, LedgerError};
use crate::service::variable;

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(Uuid),
    ValidationError(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for JobError {
    fn from(err: LedgerError) -> Self {
        JobError::Ledger(err)
    }
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Get a job by ID, masked variable values hidden in its environment
pub async fn get_job(ledger: &dyn Ledger, id: Uuid) -> Result<PipelineJob> {
    let job = ledger.find_job(id).await?.ok_or(JobError::NotFound(id))?;

    let secrets = match ledger.find_pipeline(job.pipeline_id).await? {
        Some(pipeline) => variable::masked_values(ledger, pipeline.repository_id).await?,
        None => Vec::new(),
    };
    Ok(job.redacted(&secrets))
}

/// Apply a status push from the runner executing `job_id`
///
/// The finish time is stamped once, by whichever comes first of an explicit
/// `finished` flag or a terminal status.
pub async fn update_status(
    ledger: &dyn Ledger,
    sink: &dyn NotificationSink,
    job_id: Uuid,
    update: StatusUpdate,
    now: DateTime<Utc>,
) -> Result<PipelineJob> {
    let status = parse_status(update.status.as_deref())?;
    let finishes = update.finished.unwrap_or(false) || status.is_some_and(|s| s.is_terminal());

    let transition = JobTransition {
        status,
        finished_at: finishes.then_some(now),
        exit_code: update.exit_code,
    };

    let job = ledger
        .update_job_status(job_id, transition, now)
        .await?
        .ok_or(JobError::NotFound(job_id))?;

    match job.exit_code {
        Some(code) => tracing::info!("Job {} ({}) is {} (exit {})", job.id, job.name, job.status, code),
        None => tracing::info!("Job {} ({}) is {}", job.id, job.name, job.status),
    }
    notify(sink, job.id, JobEventKind::Status, job.status.as_str());

    Ok(job)
}

// =============================================================================
// Validation
// =============================================================================

/// Blank or missing status means "no status change"
fn parse_status(raw: Option<&str>) -> Result<Option<JobStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<JobStatus>()
            .map(Some)
            .map_err(|e| JobError::ValidationError(e.to_string())),
        None => Ok(None),
    }
}
