//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::repository::LedgerError;
use crate::service::{
    job_service::JobError, lease_service::LeaseError, log_service::LogError,
    pipeline_service::PipelineError, runner_service::RunnerError,
    variable_service::VariableError,
};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    DatabaseError(LedgerError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(id) => ApiError::NotFound(format!("Pipeline {} not found", id)),
            PipelineError::ValidationError(msg) => ApiError::BadRequest(msg),
            PipelineError::Ledger(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            JobError::ValidationError(msg) => ApiError::BadRequest(msg),
            JobError::Ledger(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<LeaseError> for ApiError {
    fn from(err: LeaseError) -> Self {
        match err {
            LeaseError::NotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            LeaseError::ValidationError(msg) => ApiError::BadRequest(msg),
            LeaseError::Ledger(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<LogError> for ApiError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::NotFound(id) => ApiError::NotFound(format!("Job {} not found", id)),
            LogError::ValidationError(msg) => ApiError::BadRequest(msg),
            LogError::Ledger(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<RunnerError> for ApiError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::ValidationError(msg) => ApiError::BadRequest(msg),
            RunnerError::Ledger(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<VariableError> for ApiError {
    fn from(err: VariableError) -> Self {
        match err {
            VariableError::NotFound(key) => ApiError::NotFound(format!("Variable {} not found", key)),
            VariableError::ValidationError(msg) => ApiError::BadRequest(msg),
            VariableError::Ledger(err) => ApiError::DatabaseError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
