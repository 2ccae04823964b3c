//! Sluice HTTP Client
//!
//! A typed HTTP client for the Sluice orchestrator API, shared by the `sluice`
//! CLI and by external runners speaking the lease protocol.
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::OrchestratorClient;
//! use sluice_core::dto::job::LeaseRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080").with_token("runner-secret");
//!
//!     let lease = client.lease_job(&LeaseRequest::default()).await?;
//!     match lease.job_id {
//!         Some(job_id) => println!("Leased job {}", job_id),
//!         None => println!("Nothing to do"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod pipelines;
mod runners;
mod variables;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use sluice_core::dto::job::{LeaseRequest, LeaseResponse, StatusUpdate};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the Sluice orchestrator API
///
/// Methods are grouped by area:
/// - Pipelines: trigger, inspect, list, cancel, push hooks
/// - Jobs: details, logs, manual release
/// - Runner protocol: lease, log and status pushes, runner listing
/// - CI variables
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// Runner token sent as a bearer credential on lease polls
    token: Option<String>,
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use sluice_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080/");
    /// assert_eq!(client.base_url(), "http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Identify as the runner holding `token` when polling for jobs
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into()).filter(|t| !t.trim().is_empty());
        self
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize a JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the body as text
    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        let response = Self::check_status(response).await?;
        Ok(response.text().await?)
    }

    /// Check the status code of a response whose body is ignored (202/204)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::debug!("Orchestrator answered {}: {}", status, body);

        Err(ClientError::api_error(status.as_u16(), error_message(&body)))
    }
}

/// The `error` field of an `{"error": "..."}` body, or the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(
            client.url("/api/pipelines/trigger"),
            "http://localhost:8080/api/pipelines/trigger"
        );
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = OrchestratorClient::new("http://localhost:8080").with_token("  ");
        assert!(client.token.is_none());

        let client = OrchestratorClient::new("http://localhost:8080").with_token("abc");
        assert_eq!(client.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"Job x not found"}"#), "Job x not found");
        assert_eq!(error_message("plain failure\n"), "plain failure");
        assert_eq!(error_message(r#"{"other":1}"#), r#"{"other":1}"#);
    }
}
