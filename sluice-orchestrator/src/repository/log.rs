//! Log Repository
//!
//! Postgres queries for job log chunks. Chunks are append-only; the `seq`
//! column preserves submission order.

use chrono::{DateTime, Utc};
use sluice_core::domain::log::LogChunk;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::Result;

/// Append one chunk
pub async fn insert(executor: impl PgExecutor<'_>, chunk: &LogChunk) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pipeline_log_chunks (id, job_id, created_at, content)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(chunk.id)
    .bind(chunk.job_id)
    .bind(chunk.created_at)
    .bind(&chunk.content)
    .execute(executor)
    .await?;

    Ok(())
}

/// Get all chunks of a job in submission order
pub async fn find_by_job(executor: impl PgExecutor<'_>, job_id: Uuid) -> Result<Vec<LogChunk>> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT id, job_id, created_at, content
        FROM pipeline_log_chunks
        WHERE job_id = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    job_id: Uuid,
    created_at: DateTime<Utc>,
    content: String,
}

impl From<LogRow> for LogChunk {
    fn from(row: LogRow) -> Self {
        LogChunk {
            id: row.id,
            job_id: row.job_id,
            created_at: row.created_at,
            content: row.content,
        }
    }
}
