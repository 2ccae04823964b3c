//! Job-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::job::PipelineJob;
use sluice_core::dto::job::ReleaseResponse;
use uuid::Uuid;

impl OrchestratorClient {
    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<PipelineJob> {
        let url = self.url(&format!("/api/pipelines/jobs/{}", job_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// The full log of a job as plain text
    pub async fn get_job_logs(&self, job_id: Uuid) -> Result<String> {
        let url = self.url(&format!("/api/pipelines/jobs/{}/logs", job_id));
        let response = self.client.get(&url).send().await?;

        self.handle_text_response(response).await
    }

    /// Release a manual job so a runner may lease it
    pub async fn release_job(&self, job_id: Uuid) -> Result<ReleaseResponse> {
        let url = self.url(&format!("/api/pipelines/jobs/{}/start", job_id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}
