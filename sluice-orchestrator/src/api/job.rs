//! Job API Handlers
//!
//! Read paths for jobs, manual release, and the live event stream.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use sluice_core::domain::job::PipelineJob;
use sluice_core::dto::job::ReleaseResponse;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream, wrappers::errors::BroadcastStreamRecvError};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::{job_service, lease_service, log_service};

/// GET /api/pipelines/jobs/{job_id}
/// Get job details by ID
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<PipelineJob>> {
    tracing::debug!("Getting job: {}", job_id);

    let job = job_service::get_job(state.ledger.as_ref(), job_id).await?;
    Ok(Json(job))
}

/// GET /api/pipelines/jobs/{job_id}/logs
/// The job's log as plain text
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<String> {
    tracing::debug!("Getting logs for job: {}", job_id);

    let logs = log_service::get_logs(state.ledger.as_ref(), job_id).await?;
    Ok(logs)
}

/// POST /api/pipelines/jobs/{job_id}/start
/// Release a manual job
pub async fn release_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ReleaseResponse>> {
    tracing::info!("Releasing manual job: {}", job_id);

    let released = lease_service::release_manual(state.ledger.as_ref(), job_id).await?;
    Ok(Json(released))
}

/// GET /api/pipelines/jobs/{job_id}/stream
/// Server-sent `log` and `status` events for one job
pub async fn stream_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before the lookup so nothing published in between is missed
    let receiver = state.events.subscribe();
    job_service::get_job(state.ledger.as_ref(), job_id).await?;

    tracing::debug!("Viewer attached to job: {}", job_id);

    let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) if event.job_id == job_id => Some(Ok(Event::default()
            .event(event.kind.as_str())
            .data(event.payload))),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("Viewer of job {} fell behind, {} event(s) dropped", job_id, skipped);
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
