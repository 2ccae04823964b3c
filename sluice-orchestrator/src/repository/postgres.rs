//! Postgres-backed ledger
//!
//! Composes the per-entity query modules into the [`Ledger`] operations.
//! Multi-statement operations run in one transaction and always lock job rows
//! before the owning pipeline row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_core::domain::job::PipelineJob;
use sluice_core::domain::log::LogChunk;
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus};
use sluice_core::domain::runner::Runner;
use sluice_core::domain::variable::CiVariable;
use sqlx::PgPool;
use uuid::Uuid;

use super::{JobTransition, Ledger, Result, RunnerPoll};
use super::{job, log, pipeline, runner, variable};

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn create_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        pipeline::insert(&self.pool, pipeline).await
    }

    async fn insert_jobs(&self, jobs: &[PipelineJob]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for job in jobs {
            job::insert(&mut *tx, job).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>> {
        let Some(mut found) = pipeline::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        found.jobs = job::find_by_pipeline(&self.pool, id).await?;
        Ok(Some(found))
    }

    async fn list_pipelines(&self, repository_id: Uuid) -> Result<Vec<Pipeline>> {
        pipeline::find_by_repository(&self.pool, repository_id).await
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<PipelineJob>> {
        job::find_by_id(&self.pool, id).await
    }

    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<PipelineJob>> {
        let mut tx = self.pool.begin().await?;
        let claimed = job::claim_next(&mut *tx, now).await?;
        if let Some(job) = &claimed {
            pipeline::mark_running_if_queued(&mut *tx, job.pipeline_id, now).await?;
        }
        tx.commit().await?;
        Ok(claimed)
    }

    async fn release_manual(&self, job_id: Uuid) -> Result<Option<PipelineJob>> {
        job::release_manual(&self.pool, job_id).await
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<PipelineJob>> {
        let mut tx = self.pool.begin().await?;

        let Some(updated) = job::apply_transition(&mut *tx, job_id, transition, now).await? else {
            return Ok(None);
        };

        if let Some(owner) = pipeline::lock_by_id(&mut *tx, updated.pipeline_id).await? {
            let jobs = job::find_by_pipeline(&mut *tx, owner.id).await?;
            if let Some(next) = owner.status.reconcile(&jobs) {
                let finished_at = next.is_terminal().then_some(now);
                pipeline::update_status(&mut *tx, owner.id, next, Some(now), finished_at).await?;
                tracing::info!("Pipeline {} is now {}", owner.id, next);
            }
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn cancel_pipeline(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Vec<Uuid>>> {
        let mut tx = self.pool.begin().await?;

        if pipeline::find_by_id(&mut *tx, id).await?.is_none() {
            return Ok(None);
        }

        let canceled = job::cancel_pending(&mut *tx, id, now).await?;
        pipeline::update_status(&mut *tx, id, PipelineStatus::Canceled, None, Some(now)).await?;

        tx.commit().await?;
        Ok(Some(canceled))
    }

    async fn append_log(&self, chunk: &LogChunk) -> Result<()> {
        log::insert(&self.pool, chunk).await
    }

    async fn list_logs(&self, job_id: Uuid) -> Result<Vec<LogChunk>> {
        log::find_by_job(&self.pool, job_id).await
    }

    async fn touch_runner(&self, poll: RunnerPoll) -> Result<Runner> {
        runner::upsert_heartbeat(&self.pool, &poll).await
    }

    async fn list_runners(&self) -> Result<Vec<Runner>> {
        runner::list_all(&self.pool).await
    }

    async fn list_variables(&self, repository_id: Uuid) -> Result<Vec<CiVariable>> {
        variable::find_by_repository(&self.pool, repository_id).await
    }

    async fn put_variable(&self, variable: &CiVariable) -> Result<CiVariable> {
        variable::upsert(&self.pool, variable).await
    }

    async fn delete_variable(&self, repository_id: Uuid, key: &str) -> Result<bool> {
        variable::delete(&self.pool, repository_id, key).await
    }
}
