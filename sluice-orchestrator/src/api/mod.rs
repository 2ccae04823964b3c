//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod hook;
pub mod job;
pub mod pipeline;
pub mod runner;
pub mod variable;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::notify::BroadcastSink;
use crate::repository::Ledger;
use crate::source::SourceControl;

/// Shared handles available to every handler
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub source: Arc<dyn SourceControl>,
    pub events: Arc<BroadcastSink>,
    pub config: Arc<Config>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/api/pipelines/trigger", post(pipeline::trigger_pipeline))
        .route("/api/pipelines/{id}", get(pipeline::get_pipeline))
        .route("/api/pipelines/{id}/cancel", post(pipeline::cancel_pipeline))
        .route(
            "/api/repositories/{id}/pipelines",
            get(pipeline::list_pipelines),
        )
        // Job endpoints
        .route("/api/pipelines/jobs/{job_id}", get(job::get_job))
        .route("/api/pipelines/jobs/{job_id}/logs", get(job::get_job_logs))
        .route("/api/pipelines/jobs/{job_id}/start", post(job::release_job))
        .route("/api/pipelines/jobs/{job_id}/stream", get(job::stream_job))
        // Runner endpoints
        .route("/api/pipelines/runners", get(runner::list_runners))
        .route("/api/pipelines/runners/lease", post(runner::lease_job))
        .route(
            "/api/pipelines/runners/jobs/{job_id}/logs",
            post(runner::add_job_logs),
        )
        .route(
            "/api/pipelines/runners/jobs/{job_id}/status",
            post(runner::update_job_status),
        )
        // Variable endpoints
        .route(
            "/api/repositories/{id}/variables",
            get(variable::list_variables),
        )
        .route(
            "/api/repositories/{id}/variables/{key}",
            put(variable::put_variable).delete(variable::delete_variable),
        )
        // Git hooks
        .route("/api/hooks/push", post(hook::push_hook))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
