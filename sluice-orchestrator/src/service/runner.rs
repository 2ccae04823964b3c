//! Runner Service
//!
//! Runners are not registered up front: the first poll carrying a bearer token
//! creates the runner row and every later poll refreshes its heartbeat. Only
//! the SHA-256 of the token is ever stored.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sluice_core::domain::runner::Runner;
use sluice_core::dto::job::LeaseRequest;
use sluice_core::dto::runner::RunnerSummary;

use crate::repository::{Ledger, LedgerError, RunnerPoll};

/// Service error type
#[derive(Debug)]
pub enum RunnerError {
    ValidationError(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for RunnerError {
    fn from(err: LedgerError) -> Self {
        RunnerError::Ledger(err)
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Lowercase hex SHA-256 of a runner token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Record a poll from the runner holding `token`
pub async fn record_poll(
    ledger: &dyn Ledger,
    token: &str,
    req: &LeaseRequest,
    now: DateTime<Utc>,
) -> Result<Runner> {
    validate_token(token)?;

    let poll = RunnerPoll {
        token_hash: hash_token(token),
        name: req.name.as_deref().map(str::trim).unwrap_or_default().to_string(),
        tags: req
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        seen_at: now,
    };

    let runner = ledger.touch_runner(poll).await?;
    tracing::debug!("Heartbeat received from runner: {} ({})", runner.id, runner.name);

    Ok(runner)
}

/// List all runners with their derived online state
pub async fn list_runners(ledger: &dyn Ledger, now: DateTime<Utc>) -> Result<Vec<RunnerSummary>> {
    let runners = ledger.list_runners().await?;
    Ok(runners
        .into_iter()
        .map(|runner| RunnerSummary::from_runner(runner, now))
        .collect())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_token(token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(RunnerError::ValidationError(
            "Runner token cannot be empty".to_string(),
        ));
    }

    if token.len() > 512 {
        return Err(RunnerError::ValidationError(
            "Runner token too long (max 512 characters)".to_string(),
        ));
    }

    Ok(())
}
