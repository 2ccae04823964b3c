//! CI variable endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::variable::CiVariable;
use sluice_core::dto::variable::PutVariable;
use uuid::Uuid;

impl OrchestratorClient {
    /// List a repository's variables; masked values come back redacted
    pub async fn list_variables(&self, repository_id: Uuid) -> Result<Vec<CiVariable>> {
        let url = self.url(&format!("/api/repositories/{}/variables", repository_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Create or replace a variable
    pub async fn put_variable(
        &self,
        repository_id: Uuid,
        key: &str,
        req: &PutVariable,
    ) -> Result<CiVariable> {
        let url = self.url(&format!(
            "/api/repositories/{}/variables/{}",
            repository_id, key
        ));
        let response = self.client.put(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    pub async fn delete_variable(&self, repository_id: Uuid, key: &str) -> Result<()> {
        let url = self.url(&format!(
            "/api/repositories/{}/variables/{}",
            repository_id, key
        ));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
