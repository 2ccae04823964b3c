//! Repository Module
//!
//! Data access layer for the orchestrator.
//!
//! The [`Ledger`] trait is the single source of truth for pipelines, jobs,
//! logs, runners and CI variables. Every mutation is scoped to one job or one
//! pipeline's job set and is atomic; nothing is cached between calls.
//!
//! Two implementations exist: [`PgLedger`] over Postgres (built from the
//! per-entity query modules below) and [`MemoryLedger`] for development and
//! tests.

pub mod job;
pub mod log;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod runner;
pub mod variable;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_core::domain::job::{JobStatus, PipelineJob};
use sluice_core::domain::log::LogChunk;
use sluice_core::domain::pipeline::Pipeline;
use sluice_core::domain::runner::Runner;
use sluice_core::domain::variable::CiVariable;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored environment is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// A status change pushed by the runner executing a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobTransition {
    pub status: Option<JobStatus>,
    /// Stamped only if the job has no finish time yet
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
}

/// What a runner reports about itself when polling
#[derive(Debug, Clone)]
pub struct RunnerPoll {
    pub token_hash: String,
    pub name: String,
    pub tags: Vec<String>,
    pub seen_at: DateTime<Utc>,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Persist a new pipeline row (its jobs are inserted separately)
    async fn create_pipeline(&self, pipeline: &Pipeline) -> Result<()>;

    /// Persist all jobs of one pipeline atomically
    async fn insert_jobs(&self, jobs: &[PipelineJob]) -> Result<()>;

    /// A pipeline with its jobs in declaration order
    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>>;

    /// Pipelines of a repository, newest first, without their jobs
    async fn list_pipelines(&self, repository_id: Uuid) -> Result<Vec<Pipeline>>;

    async fn find_job(&self, id: Uuid) -> Result<Option<PipelineJob>>;

    /// Atomically move the oldest leasable queued job to running
    ///
    /// Concurrent callers never receive the same job. The owning pipeline
    /// moves from queued to running in the same operation.
    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<PipelineJob>>;

    /// Mark a manual job as released; `None` if the job does not exist
    async fn release_manual(&self, job_id: Uuid) -> Result<Option<PipelineJob>>;

    /// Apply a runner's status push and re-derive the pipeline status
    async fn update_job_status(
        &self,
        job_id: Uuid,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<PipelineJob>>;

    /// Cancel a pipeline and its queued or running jobs
    ///
    /// Returns the ids of the jobs that were canceled, or `None` if the
    /// pipeline does not exist.
    async fn cancel_pipeline(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Vec<Uuid>>>;

    async fn append_log(&self, chunk: &LogChunk) -> Result<()>;

    /// Chunks of a job in submission order
    async fn list_logs(&self, job_id: Uuid) -> Result<Vec<LogChunk>>;

    /// Register the runner behind a token if unknown, and refresh its heartbeat
    async fn touch_runner(&self, poll: RunnerPoll) -> Result<Runner>;

    async fn list_runners(&self) -> Result<Vec<Runner>>;

    async fn list_variables(&self, repository_id: Uuid) -> Result<Vec<CiVariable>>;

    /// Create or replace the variable with the same repository and key
    async fn put_variable(&self, variable: &CiVariable) -> Result<CiVariable>;

    async fn delete_variable(&self, repository_id: Uuid, key: &str) -> Result<bool>;
}
