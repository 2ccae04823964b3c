//! Variable Service
//!
//! Per-repository CI variables. Listings never reveal masked values.

use sluice_core::domain::variable::CiVariable;
use sluice_core::dto::variable::PutVariable;
use sluice_core::env::RESERVED;
use uuid::Uuid;

use crate::repository::{Ledger, LedgerError};

/// Service error type
#[derive(Debug)]
pub enum VariableError {
    NotFound(String),
    ValidationError(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for VariableError {
    fn from(err: LedgerError) -> Self {
        VariableError::Ledger(err)
    }
}

pub type Result<T> = std::result::Result<T, VariableError>;

/// List the variables of a repository, masked values redacted
pub async fn list_variables(ledger: &dyn Ledger, repository_id: Uuid) -> Result<Vec<CiVariable>> {
    let variables = ledger.list_variables(repository_id).await?;
    Ok(variables.iter().map(CiVariable::redacted).collect())
}

/// Create or replace the variable `key` of a repository
pub async fn put_variable(
    ledger: &dyn Ledger,
    repository_id: Uuid,
    key: &str,
    req: PutVariable,
) -> Result<CiVariable> {
    validate_key(key)?;
    if req.masked && req.value.is_empty() {
        return Err(VariableError::ValidationError(
            "A masked variable needs a non-empty value".to_string(),
        ));
    }

    let variable = CiVariable {
        id: Uuid::new_v4(),
        repository_id,
        key: key.to_string(),
        value: req.value,
        masked: req.masked,
        protected: req.protected,
        scope: req
            .scope
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    let stored = ledger.put_variable(&variable).await?;
    tracing::info!("Variable {} set for repository {}", stored.key, repository_id);

    Ok(stored.redacted())
}

/// Delete the variable `key` of a repository
pub async fn delete_variable(ledger: &dyn Ledger, repository_id: Uuid, key: &str) -> Result<()> {
    if !ledger.delete_variable(repository_id, key).await? {
        return Err(VariableError::NotFound(key.to_string()));
    }

    tracing::info!("Variable {} deleted from repository {}", key, repository_id);
    Ok(())
}

/// Values of every masked variable of a repository
///
/// Used to hide secrets in log text and in job environments shown to viewers.
/// All masked values are returned, including ones a ref's scope filtered out.
pub async fn masked_values(
    ledger: &dyn Ledger,
    repository_id: Uuid,
) -> std::result::Result<Vec<String>, LedgerError> {
    Ok(ledger
        .list_variables(repository_id)
        .await?
        .into_iter()
        .filter(|variable| variable.masked)
        .map(|variable| variable.value)
        .collect())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(VariableError::ValidationError(
            "Variable key cannot be empty".to_string(),
        ));
    }

    if key.len() > 255 {
        return Err(VariableError::ValidationError(
            "Variable key too long (max 255 characters)".to_string(),
        ));
    }

    let mut chars = key.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(VariableError::ValidationError(format!(
            "Invalid variable key '{}': use letters, digits and underscores",
            key
        )));
    }

    if RESERVED.contains(&key) {
        return Err(VariableError::ValidationError(format!(
            "'{}' is set by the orchestrator and cannot be overridden",
            key
        )));
    }

    Ok(())
}
