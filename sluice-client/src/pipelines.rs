//! Pipeline-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::pipeline::Pipeline;
use sluice_core::dto::pipeline::{PushHook, TriggerPipeline};
use uuid::Uuid;

impl OrchestratorClient {
    /// Trigger a pipeline from the repository's definition file
    ///
    /// The returned pipeline may have no jobs when the definition is missing
    /// or every job was filtered out by its rules.
    ///
    /// # Example
    /// ```no_run
    /// # use sluice_client::OrchestratorClient;
    /// # use sluice_core::domain::pipeline::PipelineSource;
    /// # use sluice_core::dto::pipeline::TriggerPipeline;
    /// # use uuid::Uuid;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// let pipeline = client.trigger_pipeline(&TriggerPipeline {
    ///     repository_id: Uuid::new_v4(),
    ///     ref_name: Some("main".to_string()),
    ///     commit_sha: None,
    ///     source: PipelineSource::Manual,
    ///     changed_paths: None,
    /// }).await?;
    /// println!("{} job(s)", pipeline.jobs.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn trigger_pipeline(&self, req: &TriggerPipeline) -> Result<Pipeline> {
        let url = self.url("/api/pipelines/trigger");
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Get a pipeline with its jobs
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        let url = self.url(&format!("/api/pipelines/{}", pipeline_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List a repository's pipelines, newest first
    pub async fn list_pipelines(&self, repository_id: Uuid) -> Result<Vec<Pipeline>> {
        let url = self.url(&format!("/api/repositories/{}/pipelines", repository_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a pipeline; succeeds for unknown ids too
    pub async fn cancel_pipeline(&self, pipeline_id: Uuid) -> Result<()> {
        let url = self.url(&format!("/api/pipelines/{}/cancel", pipeline_id));
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Report a ref update; the pipeline is created asynchronously
    pub async fn notify_push(&self, hook: &PushHook) -> Result<()> {
        let url = self.url("/api/hooks/push");
        let response = self.client.post(&url).json(hook).send().await?;

        self.handle_empty_response(response).await
    }
}
