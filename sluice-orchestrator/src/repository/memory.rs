//! In-memory ledger
//!
//! Process-local implementation of [`Ledger`]. Every operation holds a single
//! mutex for its whole duration, which makes each one atomic with respect to
//! the others. Used by the `memory` backend and by service tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_core::domain::job::{JobStatus, PipelineJob};
use sluice_core::domain::log::LogChunk;
use sluice_core::domain::pipeline::{Pipeline, PipelineStatus};
use sluice_core::domain::runner::Runner;
use sluice_core::domain::variable::CiVariable;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{JobTransition, Ledger, Result, RunnerPoll};

#[derive(Default)]
struct State {
    /// Pipelines without their jobs
    pipelines: HashMap<Uuid, Pipeline>,
    /// Jobs in insertion order
    jobs: Vec<PipelineJob>,
    logs: HashMap<Uuid, Vec<LogChunk>>,
    runners: Vec<Runner>,
    variables: Vec<CiVariable>,
}

impl State {
    fn job_mut(&mut self, id: Uuid) -> Option<&mut PipelineJob> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    fn jobs_of(&self, pipeline_id: Uuid) -> Vec<PipelineJob> {
        let mut jobs: Vec<PipelineJob> = self
            .jobs
            .iter()
            .filter(|job| job.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.position, job.created_at));
        jobs
    }

    fn reconcile_pipeline(&mut self, pipeline_id: Uuid, now: DateTime<Utc>) {
        let jobs = self.jobs_of(pipeline_id);
        let Some(pipeline) = self.pipelines.get_mut(&pipeline_id) else {
            return;
        };
        if let Some(next) = pipeline.status.reconcile(&jobs) {
            pipeline.status = next;
            pipeline.started_at.get_or_insert(now);
            if next.is_terminal() {
                pipeline.finished_at.get_or_insert(now);
            }
            tracing::info!("Pipeline {} is now {}", pipeline_id, next);
        }
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        let mut stored = pipeline.clone();
        stored.jobs.clear();
        self.state.lock().await.pipelines.insert(stored.id, stored);
        Ok(())
    }

    async fn insert_jobs(&self, jobs: &[PipelineJob]) -> Result<()> {
        self.state.lock().await.jobs.extend_from_slice(jobs);
        Ok(())
    }

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>> {
        let state = self.state.lock().await;
        Ok(state.pipelines.get(&id).map(|pipeline| {
            let mut found = pipeline.clone();
            found.jobs = state.jobs_of(id);
            found
        }))
    }

    async fn list_pipelines(&self, repository_id: Uuid) -> Result<Vec<Pipeline>> {
        let state = self.state.lock().await;
        let mut pipelines: Vec<Pipeline> = state
            .pipelines
            .values()
            .filter(|pipeline| pipeline.repository_id == repository_id)
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pipelines)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<PipelineJob>> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().find(|job| job.id == id).cloned())
    }

    async fn claim_next_job(&self, now: DateTime<Utc>) -> Result<Option<PipelineJob>> {
        let mut state = self.state.lock().await;

        let Some(index) = state
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.is_leasable(now))
            .min_by_key(|(_, job)| (job.created_at, job.position))
            .map(|(index, _)| index)
        else {
            return Ok(None);
        };

        let job = &mut state.jobs[index];
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        let claimed = job.clone();

        if let Some(pipeline) = state.pipelines.get_mut(&claimed.pipeline_id) {
            if pipeline.status == PipelineStatus::Queued {
                pipeline.status = PipelineStatus::Running;
                pipeline.started_at.get_or_insert(now);
            }
        }

        Ok(Some(claimed))
    }

    async fn release_manual(&self, job_id: Uuid) -> Result<Option<PipelineJob>> {
        let mut state = self.state.lock().await;
        Ok(state.job_mut(job_id).map(|job| {
            job.manual_released = true;
            job.clone()
        }))
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        transition: JobTransition,
        now: DateTime<Utc>,
    ) -> Result<Option<PipelineJob>> {
        let mut state = self.state.lock().await;

        let Some(job) = state.job_mut(job_id) else {
            return Ok(None);
        };
        if let Some(status) = transition.status {
            job.status = status;
            if status == JobStatus::Running {
                job.started_at.get_or_insert(now);
            }
        }
        if let Some(finished_at) = transition.finished_at {
            job.finished_at.get_or_insert(finished_at);
        }
        if let Some(exit_code) = transition.exit_code {
            job.exit_code = Some(exit_code);
        }
        let updated = job.clone();

        state.reconcile_pipeline(updated.pipeline_id, now);
        Ok(Some(updated))
    }

    async fn cancel_pipeline(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Vec<Uuid>>> {
        let mut state = self.state.lock().await;

        let Some(pipeline) = state.pipelines.get_mut(&id) else {
            return Ok(None);
        };
        pipeline.status = PipelineStatus::Canceled;
        pipeline.finished_at.get_or_insert(now);

        let mut canceled = Vec::new();
        for job in state
            .jobs
            .iter_mut()
            .filter(|job| job.pipeline_id == id && job.status.is_cancelable())
        {
            job.status = JobStatus::Canceled;
            job.finished_at = Some(now);
            canceled.push(job.id);
        }

        Ok(Some(canceled))
    }

    async fn append_log(&self, chunk: &LogChunk) -> Result<()> {
        self.state
            .lock()
            .await
            .logs
            .entry(chunk.job_id)
            .or_default()
            .push(chunk.clone());
        Ok(())
    }

    async fn list_logs(&self, job_id: Uuid) -> Result<Vec<LogChunk>> {
        let state = self.state.lock().await;
        Ok(state.logs.get(&job_id).cloned().unwrap_or_default())
    }

    async fn touch_runner(&self, poll: RunnerPoll) -> Result<Runner> {
        let mut state = self.state.lock().await;

        if let Some(runner) = state
            .runners
            .iter_mut()
            .find(|runner| runner.token_hash == poll.token_hash)
        {
            runner.last_heartbeat_at = Some(poll.seen_at);
            if !poll.name.is_empty() {
                runner.name = poll.name;
            }
            if !poll.tags.is_empty() {
                runner.tags = poll.tags;
            }
            return Ok(runner.clone());
        }

        let runner = Runner {
            id: Uuid::new_v4(),
            name: poll.name,
            token_hash: poll.token_hash,
            tags: poll.tags,
            active: true,
            last_heartbeat_at: Some(poll.seen_at),
        };
        state.runners.push(runner.clone());
        Ok(runner)
    }

    async fn list_runners(&self) -> Result<Vec<Runner>> {
        let mut runners = self.state.lock().await.runners.clone();
        runners.sort_by(|a, b| b.last_heartbeat_at.cmp(&a.last_heartbeat_at));
        Ok(runners)
    }

    async fn list_variables(&self, repository_id: Uuid) -> Result<Vec<CiVariable>> {
        let state = self.state.lock().await;
        let mut variables: Vec<CiVariable> = state
            .variables
            .iter()
            .filter(|variable| variable.repository_id == repository_id)
            .cloned()
            .collect();
        variables.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(variables)
    }

    async fn put_variable(&self, variable: &CiVariable) -> Result<CiVariable> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.variables.iter_mut().find(|existing| {
            existing.repository_id == variable.repository_id && existing.key == variable.key
        }) {
            let id = existing.id;
            *existing = CiVariable {
                id,
                ..variable.clone()
            };
            return Ok(existing.clone());
        }

        state.variables.push(variable.clone());
        Ok(variable.clone())
    }

    async fn delete_variable(&self, repository_id: Uuid, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.variables.len();
        state
            .variables
            .retain(|variable| !(variable.repository_id == repository_id && variable.key == key));
        Ok(state.variables.len() < before)
    }
}
