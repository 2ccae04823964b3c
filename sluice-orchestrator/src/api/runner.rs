//! Runner API Handlers
//!
//! The poll-driven runner protocol: lease a job, push its log output, push
//! its status. Plus the runner listing.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
};
use chrono::Utc;
use sluice_core::dto::job::{LeaseRequest, LeaseResponse, StatusUpdate};
use sluice_core::dto::runner::RunnerSummary;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::{job_service, lease_service, log_service, runner_service};

// =============================================================================
// Runner Protocol
// =============================================================================

/// POST /api/pipelines/runners/lease
/// Lease the next eligible job; `jobId` is null when there is none
///
/// The body is optional. An `Authorization: Bearer <token>` header identifies
/// the runner for heartbeat tracking.
pub async fn lease_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<LeaseResponse>> {
    let req = parse_lease_request(&body)?;
    let token = bearer_token(&headers);

    tracing::debug!(
        "Lease poll from {}",
        req.name.as_deref().unwrap_or("anonymous runner")
    );

    let response = lease_service::lease_job(
        state.ledger.as_ref(),
        state.events.as_ref(),
        token,
        req,
        Utc::now(),
    )
    .await?;

    Ok(Json(response))
}

/// POST /api/pipelines/runners/jobs/{job_id}/logs
/// Append raw log text to a job
pub async fn add_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    body: String,
) -> ApiResult<StatusCode> {
    log_service::append_logs(state.ledger.as_ref(), state.events.as_ref(), job_id, &body).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/pipelines/runners/jobs/{job_id}/status
/// Push a status change for a job
pub async fn update_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<StatusCode> {
    tracing::debug!("Status push for job {}: {:?}", job_id, update);

    job_service::update_status(
        state.ledger.as_ref(),
        state.events.as_ref(),
        job_id,
        update,
        Utc::now(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Runner Query Endpoints
// =============================================================================

/// GET /api/pipelines/runners
/// List all known runners
pub async fn list_runners(State(state): State<AppState>) -> ApiResult<Json<Vec<RunnerSummary>>> {
    tracing::debug!("Listing all runners");

    let runners = runner_service::list_runners(state.ledger.as_ref(), Utc::now()).await?;
    Ok(Json(runners))
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_lease_request(body: &[u8]) -> ApiResult<LeaseRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LeaseRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid lease request: {}", e)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
