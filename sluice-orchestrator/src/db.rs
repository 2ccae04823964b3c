use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id UUID PRIMARY KEY,
            repository_id UUID NOT NULL,
            status VARCHAR(20) NOT NULL,
            source VARCHAR(20) NOT NULL,
            ref_name TEXT NOT NULL,
            commit_sha TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create jobs table; a pipeline exclusively owns its jobs
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_jobs (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            position INTEGER NOT NULL,
            image TEXT,
            script TEXT NOT NULL,
            status VARCHAR(20) NOT NULL,
            when_type VARCHAR(20) NOT NULL,
            is_manual BOOLEAN NOT NULL DEFAULT FALSE,
            allow_failure BOOLEAN NOT NULL DEFAULT FALSE,
            start_after_seconds BIGINT,
            rule TEXT,
            manual_released BOOLEAN NOT NULL DEFAULT FALSE,
            timeout_seconds BIGINT,
            env_json TEXT NOT NULL DEFAULT '{}',
            exit_code INTEGER,
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create log chunk table; seq preserves submission order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_log_chunks (
            seq BIGSERIAL PRIMARY KEY,
            id UUID NOT NULL UNIQUE,
            job_id UUID NOT NULL REFERENCES pipeline_jobs(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL,
            content TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create runners table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runners (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            tags TEXT NOT NULL DEFAULT '',
            active BOOLEAN NOT NULL DEFAULT TRUE,
            last_heartbeat_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create CI variables table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ci_variables (
            id UUID PRIMARY KEY,
            repository_id UUID NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            masked BOOLEAN NOT NULL DEFAULT FALSE,
            protected BOOLEAN NOT NULL DEFAULT FALSE,
            scope TEXT,
            UNIQUE (repository_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipelines_repository ON pipelines(repository_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_jobs_pipeline_id ON pipeline_jobs(pipeline_id, position)",
    )
    .execute(pool)
    .await?;

    // The lease broker only ever scans queued jobs, oldest first
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_jobs_queued ON pipeline_jobs(created_at, position) WHERE status = 'queued'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_log_chunks_job_id ON pipeline_log_chunks(job_id, seq)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
