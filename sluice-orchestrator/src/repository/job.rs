//! Job Repository
//!
//! Postgres queries for the pipeline_jobs table, including the atomic claim
//! used by the lease broker.

use chrono::{DateTime, Utc};
use sluice_core::JobEnv;
use sluice_core::domain::job::PipelineJob;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{JobTransition, LedgerError, Result};

const COLUMNS: &str = "id, pipeline_id, name, position, image, script, status, when_type, \
                       is_manual, allow_failure, start_after_seconds, rule, manual_released, \
                       timeout_seconds, env_json, exit_code, created_at, started_at, finished_at";

/// Insert a job row
pub async fn insert(executor: impl PgExecutor<'_>, job: &PipelineJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_jobs (id, pipeline_id, name, position, image, script, status,
                                   when_type, is_manual, allow_failure, start_after_seconds,
                                   rule, manual_released, timeout_seconds, env_json, exit_code,
                                   created_at, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(job.id)
    .bind(job.pipeline_id)
    .bind(&job.name)
    .bind(i32::try_from(job.position).unwrap_or(i32::MAX))
    .bind(&job.image)
    .bind(&job.script)
    .bind(job.status.as_str())
    .bind(job.when_type.as_str())
    .bind(job.is_manual)
    .bind(job.allow_failure)
    .bind(job.start_after_seconds.map(i64::from))
    .bind(&job.rule)
    .bind(job.manual_released)
    .bind(job.timeout_seconds.map(i64::from))
    .bind(job.env.to_json()?)
    .bind(job.exit_code)
    .bind(job.created_at)
    .bind(job.started_at)
    .bind(job.finished_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Find a job by ID
pub async fn find_by_id(executor: impl PgExecutor<'_>, id: Uuid) -> Result<Option<PipelineJob>> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {COLUMNS} FROM pipeline_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(PipelineJob::try_from).transpose()
}

/// Find the jobs of a pipeline in declaration order
pub async fn find_by_pipeline(
    executor: impl PgExecutor<'_>,
    pipeline_id: Uuid,
) -> Result<Vec<PipelineJob>> {
    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {COLUMNS} FROM pipeline_jobs WHERE pipeline_id = $1 ORDER BY position, created_at"
    ))
    .bind(pipeline_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(PipelineJob::try_from).collect()
}

/// Claim the oldest leasable queued job
///
/// Selection and claim are a single statement. `SKIP LOCKED` makes a
/// concurrent claimer pass over a row another transaction is claiming, and the
/// outer `status = 'queued'` guard keeps the update conditional.
pub async fn claim_next(
    executor: impl PgExecutor<'_>,
    now: DateTime<Utc>,
) -> Result<Option<PipelineJob>> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        UPDATE pipeline_jobs
        SET status = 'running', started_at = $1
        WHERE id = (
            SELECT id FROM pipeline_jobs
            WHERE status = 'queued'
              AND (when_type <> 'manual' OR manual_released)
              AND (when_type <> 'delayed'
                   OR start_after_seconds IS NULL
                   OR created_at + make_interval(secs => start_after_seconds::double precision) <= $1)
            ORDER BY created_at, position
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        AND status = 'queued'
        RETURNING {COLUMNS}
        "#
    ))
    .bind(now)
    .fetch_optional(executor)
    .await?;

    row.map(PipelineJob::try_from).transpose()
}

/// Set the manual-released flag
pub async fn release_manual(
    executor: impl PgExecutor<'_>,
    id: Uuid,
) -> Result<Option<PipelineJob>> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "UPDATE pipeline_jobs SET manual_released = TRUE WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(PipelineJob::try_from).transpose()
}

/// Apply a runner's status push to one job
pub async fn apply_transition(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    transition: JobTransition,
    now: DateTime<Utc>,
) -> Result<Option<PipelineJob>> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        r#"
        UPDATE pipeline_jobs
        SET status = COALESCE($2, status),
            started_at = CASE WHEN $2 = 'running' THEN COALESCE(started_at, $5) ELSE started_at END,
            finished_at = COALESCE(finished_at, $3),
            exit_code = COALESCE($4, exit_code)
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(transition.status.map(|s| s.as_str()))
    .bind(transition.finished_at)
    .bind(transition.exit_code)
    .bind(now)
    .fetch_optional(executor)
    .await?;

    row.map(PipelineJob::try_from).transpose()
}

/// Cancel every queued or running job of a pipeline, returning their ids
pub async fn cancel_pending(
    executor: impl PgExecutor<'_>,
    pipeline_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE pipeline_jobs
        SET status = 'canceled', finished_at = $2
        WHERE pipeline_id = $1 AND status IN ('queued', 'running')
        RETURNING id
        "#,
    )
    .bind(pipeline_id)
    .bind(now)
    .fetch_all(executor)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    pipeline_id: Uuid,
    name: String,
    position: i32,
    image: Option<String>,
    script: String,
    status: String,
    when_type: String,
    is_manual: bool,
    allow_failure: bool,
    start_after_seconds: Option<i64>,
    rule: Option<String>,
    manual_released: bool,
    timeout_seconds: Option<i64>,
    env_json: String,
    exit_code: Option<i32>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for PipelineJob {
    type Error = LedgerError;

    fn try_from(row: JobRow) -> Result<Self> {
        let id = row.id;
        let corrupt =
            move |e: sluice_core::domain::UnknownVariant| LedgerError::Corrupt(format!("job {}: {}", id, e));

        Ok(PipelineJob {
            id: row.id,
            pipeline_id: row.pipeline_id,
            name: row.name,
            position: u32::try_from(row.position).unwrap_or_default(),
            image: row.image,
            script: row.script,
            status: row.status.parse().map_err(corrupt)?,
            when_type: row.when_type.parse().map_err(corrupt)?,
            is_manual: row.is_manual,
            allow_failure: row.allow_failure,
            start_after_seconds: row.start_after_seconds.and_then(|s| u32::try_from(s).ok()),
            rule: row.rule,
            manual_released: row.manual_released,
            timeout_seconds: row.timeout_seconds.and_then(|s| u32::try_from(s).ok()),
            env: JobEnv::from_json(&row.env_json)?,
            exit_code: row.exit_code,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}
