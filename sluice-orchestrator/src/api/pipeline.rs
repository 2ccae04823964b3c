//! Pipeline API Handlers
//!
//! HTTP endpoints for triggering, inspecting and canceling pipelines.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sluice_core::domain::pipeline::Pipeline;
use sluice_core::dto::pipeline::TriggerPipeline;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::pipeline_service;

/// POST /api/pipelines/trigger
/// Create a pipeline from the repository's definition file
pub async fn trigger_pipeline(
    State(state): State<AppState>,
    Json(req): Json<TriggerPipeline>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!(
        "Triggering pipeline for repository {} ({})",
        req.repository_id,
        req.source
    );

    let pipeline = pipeline_service::trigger(
        state.ledger.as_ref(),
        state.source.as_ref(),
        &state.config,
        req,
    )
    .await?;

    Ok(Json(pipeline))
}

/// GET /api/pipelines/{id}
/// Get a pipeline with its jobs
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipeline_service::get_pipeline(state.ledger.as_ref(), id).await?;
    Ok(Json(pipeline))
}

/// POST /api/pipelines/{id}/cancel
/// Cancel a pipeline; unknown ids still answer 204
pub async fn cancel_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Canceling pipeline: {}", id);

    pipeline_service::cancel(state.ledger.as_ref(), state.events.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/repositories/{id}/pipelines
/// List a repository's pipelines, newest first
pub async fn list_pipelines(
    State(state): State<AppState>,
    Path(repository_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Pipeline>>> {
    tracing::debug!("Listing pipelines for repository: {}", repository_id);

    let pipelines = pipeline_service::list_pipelines(state.ledger.as_ref(), repository_id).await?;
    Ok(Json(pipelines))
}
