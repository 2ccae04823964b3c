//! Runner protocol endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::dto::job::{LeaseRequest, LeaseResponse, StatusUpdate};
use sluice_core::dto::runner::RunnerSummary;
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Lease Protocol
    // =============================================================================

    /// Poll for the next eligible job
    ///
    /// `job_id` in the answer is `None` when nothing is available; poll again
    /// later. Sends the client's token, if any, as a bearer credential.
    ///
    /// # Example
    /// ```no_run
    /// # use sluice_client::{LeaseRequest, OrchestratorClient, StatusUpdate};
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080").with_token("secret");
    /// let lease = client.lease_job(&LeaseRequest {
    ///     name: Some("builder-1".to_string()),
    ///     tags: vec!["linux".to_string()],
    /// }).await?;
    ///
    /// if let Some(job_id) = lease.job_id {
    ///     client.append_logs(job_id, "building...\n").await?;
    ///     client.update_status(job_id, &StatusUpdate {
    ///         status: Some("succeeded".to_string()),
    ///         finished: Some(true),
    ///         exit_code: Some(0),
    ///     }).await?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn lease_job(&self, req: &LeaseRequest) -> Result<LeaseResponse> {
        let url = self.url("/api/pipelines/runners/lease");
        let request = self.authorized(self.client.post(&url)).json(req);
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Append raw log output to a job
    pub async fn append_logs(&self, job_id: Uuid, text: impl Into<String>) -> Result<()> {
        let url = self.url(&format!("/api/pipelines/runners/jobs/{}/logs", job_id));
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(text.into())
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Push a status change for a job
    pub async fn update_status(&self, job_id: Uuid, update: &StatusUpdate) -> Result<()> {
        let url = self.url(&format!("/api/pipelines/runners/jobs/{}/status", job_id));
        let response = self.client.post(&url).json(update).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Runner Queries
    // =============================================================================

    /// List all known runners
    pub async fn list_runners(&self) -> Result<Vec<RunnerSummary>> {
        let url = self.url("/api/pipelines/runners");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
