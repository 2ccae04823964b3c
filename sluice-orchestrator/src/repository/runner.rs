//! Runner Repository
//!
//! Postgres queries for runners. A runner is identified by the SHA-256 digest
//! of its token.

use chrono::{DateTime, Utc};
use sluice_core::domain::runner::{Runner, join_tags, parse_tags};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{Result, RunnerPoll};

/// Register the runner behind `poll.token_hash`, or refresh an existing one
///
/// The name and tags are only overwritten when the poll carries them.
pub async fn upsert_heartbeat(executor: impl PgExecutor<'_>, poll: &RunnerPoll) -> Result<Runner> {
    let row = sqlx::query_as::<_, RunnerRow>(
        r#"
        INSERT INTO runners (id, name, token_hash, tags, active, last_heartbeat_at)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        ON CONFLICT (token_hash) DO UPDATE
        SET last_heartbeat_at = EXCLUDED.last_heartbeat_at,
            name = CASE WHEN $6 THEN EXCLUDED.name ELSE runners.name END,
            tags = CASE WHEN $7 THEN EXCLUDED.tags ELSE runners.tags END
        RETURNING id, name, token_hash, tags, active, last_heartbeat_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&poll.name)
    .bind(&poll.token_hash)
    .bind(join_tags(&poll.tags))
    .bind(poll.seen_at)
    .bind(!poll.name.is_empty())
    .bind(!poll.tags.is_empty())
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// List all runners, most recently seen first
pub async fn list_all(executor: impl PgExecutor<'_>) -> Result<Vec<Runner>> {
    let rows = sqlx::query_as::<_, RunnerRow>(
        r#"
        SELECT id, name, token_hash, tags, active, last_heartbeat_at
        FROM runners
        ORDER BY last_heartbeat_at DESC NULLS LAST, name
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunnerRow {
    id: Uuid,
    name: String,
    token_hash: String,
    tags: String,
    active: bool,
    last_heartbeat_at: Option<DateTime<Utc>>,
}

impl From<RunnerRow> for Runner {
    fn from(row: RunnerRow) -> Self {
        Runner {
            id: row.id,
            name: row.name,
            token_hash: row.token_hash,
            tags: parse_tags(&row.tags),
            active: row.active,
            last_heartbeat_at: row.last_heartbeat_at,
        }
    }
}
