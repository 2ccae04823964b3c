//! CI Variable Repository
//!
//! Postgres queries for repository-scoped CI variables.

use sluice_core::domain::variable::CiVariable;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::Result;

/// List the variables of a repository, ordered by key
pub async fn find_by_repository(
    executor: impl PgExecutor<'_>,
    repository_id: Uuid,
) -> Result<Vec<CiVariable>> {
    let rows = sqlx::query_as::<_, VariableRow>(
        r#"
        SELECT id, repository_id, key, value, masked, protected, scope
        FROM ci_variables
        WHERE repository_id = $1
        ORDER BY key
        "#,
    )
    .bind(repository_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Insert or replace by (repository, key); the original id is kept on replace
pub async fn upsert(executor: impl PgExecutor<'_>, variable: &CiVariable) -> Result<CiVariable> {
    let row = sqlx::query_as::<_, VariableRow>(
        r#"
        INSERT INTO ci_variables (id, repository_id, key, value, masked, protected, scope)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (repository_id, key) DO UPDATE
        SET value = EXCLUDED.value,
            masked = EXCLUDED.masked,
            protected = EXCLUDED.protected,
            scope = EXCLUDED.scope
        RETURNING id, repository_id, key, value, masked, protected, scope
        "#,
    )
    .bind(variable.id)
    .bind(variable.repository_id)
    .bind(&variable.key)
    .bind(&variable.value)
    .bind(variable.masked)
    .bind(variable.protected)
    .bind(&variable.scope)
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// Delete a variable, returning whether it existed
pub async fn delete(executor: impl PgExecutor<'_>, repository_id: Uuid, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM ci_variables WHERE repository_id = $1 AND key = $2")
        .bind(repository_id)
        .bind(key)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct VariableRow {
    id: Uuid,
    repository_id: Uuid,
    key: String,
    value: String,
    masked: bool,
    protected: bool,
    scope: Option<String>,
}

impl From<VariableRow> for CiVariable {
    fn from(row: VariableRow) -> Self {
        CiVariable {
            id: row.id,
            repository_id: row.repository_id,
            key: row.key,
            value: row.value,
            masked: row.masked,
            protected: row.protected,
            scope: row.scope,
        }
    }
}
