//! Variable API Handlers
//!
//! Per-repository CI variables.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sluice_core::domain::variable::CiVariable;
use sluice_core::dto::variable::PutVariable;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::variable_service;

/// GET /api/repositories/{id}/variables
/// List variables; masked values are redacted
pub async fn list_variables(
    State(state): State<AppState>,
    Path(repository_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CiVariable>>> {
    tracing::debug!("Listing variables for repository: {}", repository_id);

    let variables = variable_service::list_variables(state.ledger.as_ref(), repository_id).await?;
    Ok(Json(variables))
}

/// PUT /api/repositories/{id}/variables/{key}
/// Create or replace a variable
pub async fn put_variable(
    State(state): State<AppState>,
    Path((repository_id, key)): Path<(Uuid, String)>,
    Json(req): Json<PutVariable>,
) -> ApiResult<Json<CiVariable>> {
    let variable =
        variable_service::put_variable(state.ledger.as_ref(), repository_id, &key, req).await?;
    Ok(Json(variable))
}

/// DELETE /api/repositories/{id}/variables/{key}
/// Delete a variable
pub async fn delete_variable(
    State(state): State<AppState>,
    Path((repository_id, key)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    variable_service::delete_variable(state.ledger.as_ref(), repository_id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
