//! Log Service
//!
//! Log text pushed by runners is masked, stored as an append-only chunk and
//! forwarded to live viewers. Reading a job's log concatenates its chunks in
//! arrival order.

use sluice_core::domain::log::{LogChunk, concat_chunks};
use sluice_core::domain::variable::mask_secrets;
use sluice_core::dto::job::JobEventKind;
use uuid::Uuid;

use crate::notify::{NotificationSink, notify};
use crate::repository::{Ledger, LedgerError};
use crate::service::variable;

/// Largest accepted log push
pub const MAX_CHUNK_BYTES: usize = 1024 * 1024;

/// Service error type
#[derive(Debug)]
pub enum LogError {
    NotFound(Uuid),
    ValidationError(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for LogError {
    fn from(err: LedgerError) -> Self {
        LogError::Ledger(err)
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Append a chunk of log output to a job
///
/// Values of the repository's masked variables are replaced before the text
/// is stored or published. Empty pushes are accepted and ignored.
pub async fn append_logs(
    ledger: &dyn Ledger,
    sink: &dyn NotificationSink,
    job_id: Uuid,
    text: &str,
) -> Result<()> {
    validate_chunk(text)?;

    let job = ledger
        .find_job(job_id)
        .await?
        .ok_or(LogError::NotFound(job_id))?;

    if text.is_empty() {
        return Ok(());
    }

    let secrets = pipeline_secrets(ledger, job.pipeline_id).await?;
    let chunk = LogChunk::new(job_id, mask_secrets(text, &secrets));
    ledger.append_log(&chunk).await?;

    tracing::debug!("Stored {} byte(s) of log for job {}", chunk.content.len(), job_id);
    notify(sink, job_id, JobEventKind::Log, chunk.content);

    Ok(())
}

/// The full log of a job
pub async fn get_logs(ledger: &dyn Ledger, job_id: Uuid) -> Result<String> {
    if ledger.find_job(job_id).await?.is_none() {
        return Err(LogError::NotFound(job_id));
    }

    let chunks = ledger.list_logs(job_id).await?;
    Ok(concat_chunks(&chunks))
}

/// Masked values of the repository owning `pipeline_id`
async fn pipeline_secrets(ledger: &dyn Ledger, pipeline_id: Uuid) -> Result<Vec<String>> {
    match ledger.find_pipeline(pipeline_id).await? {
        Some(pipeline) => Ok(variable::masked_values(ledger, pipeline.repository_id).await?),
        None => Ok(Vec::new()),
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_chunk(text: &str) -> Result<()> {
    if text.len() > MAX_CHUNK_BYTES {
        return Err(LogError::ValidationError(format!(
            "Log chunk too large ({} bytes, max {})",
            text.len(),
            MAX_CHUNK_BYTES
        )));
    }

    Ok(())
}
