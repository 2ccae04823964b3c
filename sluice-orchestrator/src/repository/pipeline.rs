//! Pipeline Repository
//!
//! Postgres queries for the pipelines table. Functions accept any executor so
//! they can run on the pool or inside a transaction.

use chrono::{DateTime, Utc};
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{LedgerError, Result};

const COLUMNS: &str =
    "id, repository_id, status, source, ref_name, commit_sha, created_at, started_at, finished_at";

/// Insert a new pipeline row
pub async fn insert(executor: impl PgExecutor<'_>, pipeline: &Pipeline) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pipelines (id, repository_id, status, source, ref_name, commit_sha,
                               created_at, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(pipeline.id)
    .bind(pipeline.repository_id)
    .bind(pipeline.status.as_str())
    .bind(pipeline.source.as_str())
    .bind(&pipeline.ref_name)
    .bind(&pipeline.commit_sha)
    .bind(pipeline.created_at)
    .bind(pipeline.started_at)
    .bind(pipeline.finished_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Find a pipeline by ID (jobs not loaded)
pub async fn find_by_id(executor: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Pipeline>> {
    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        "SELECT {COLUMNS} FROM pipelines WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Pipeline::try_from).transpose()
}

/// Find a pipeline by ID and lock its row until the transaction ends
pub async fn lock_by_id(executor: impl PgExecutor<'_>, id: Uuid) -> Result<Option<Pipeline>> {
    let row = sqlx::query_as::<_, PipelineRow>(&format!(
        "SELECT {COLUMNS} FROM pipelines WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Pipeline::try_from).transpose()
}

/// List pipelines of a repository, newest first
pub async fn find_by_repository(
    executor: impl PgExecutor<'_>,
    repository_id: Uuid,
) -> Result<Vec<Pipeline>> {
    let rows = sqlx::query_as::<_, PipelineRow>(&format!(
        "SELECT {COLUMNS} FROM pipelines WHERE repository_id = $1 ORDER BY created_at DESC"
    ))
    .bind(repository_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Pipeline::try_from).collect()
}

/// Set the status, stamping start/finish times only where still unset
pub async fn update_status(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    status: PipelineStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE pipelines
        SET status = $2,
            started_at = COALESCE(started_at, $3),
            finished_at = COALESCE(finished_at, $4)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(started_at)
    .bind(finished_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Move a queued pipeline to running; no-op in any other state
pub async fn mark_running_if_queued(
    executor: impl PgExecutor<'_>,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE pipelines
        SET status = 'running', started_at = COALESCE(started_at, $2)
        WHERE id = $1 AND status = 'queued'
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    repository_id: Uuid,
    status: String,
    source: String,
    ref_name: String,
    commit_sha: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<PipelineRow> for Pipeline {
    type Error = LedgerError;

    fn try_from(row: PipelineRow) -> Result<Self> {
        Ok(Pipeline {
            id: row.id,
            repository_id: row.repository_id,
            status: row
                .status
                .parse()
                .map_err(|e| LedgerError::Corrupt(format!("pipeline {}: {}", row.id, e)))?,
            source: row
                .source
                .parse()
                .map_err(|e| LedgerError::Corrupt(format!("pipeline {}: {}", row.id, e)))?,
            ref_name: row.ref_name,
            commit_sha: row.commit_sha,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            jobs: Vec::new(),
        })
    }
}
