//! Git Hook API Handler
//!
//! Push notifications from the git host. The hook answers at once and the
//! pipeline is triggered in the background; failures only reach the log.

use axum::{Json, extract::State, http::StatusCode};
use sluice_core::dto::pipeline::PushHook;

use crate::api::AppState;
use crate::service::pipeline_service::{self, PipelineError};

/// POST /api/hooks/push
/// Trigger a push pipeline for a ref update
pub async fn push_hook(State(state): State<AppState>, Json(hook): Json<PushHook>) -> StatusCode {
    tracing::info!(
        "Push to {} in repository {} ({} -> {})",
        hook.ref_name,
        hook.repository_id,
        hook.before,
        hook.after
    );

    tokio::spawn(async move {
        let repository_id = hook.repository_id;
        let result = pipeline_service::trigger_from_push(
            state.ledger.as_ref(),
            state.source.as_ref(),
            &state.config,
            hook,
        )
        .await;

        match result {
            Ok(pipeline) => tracing::debug!("Push pipeline {} created", pipeline.id),
            Err(PipelineError::Ledger(err)) => {
                tracing::error!("Push trigger for repository {} failed: {}", repository_id, err)
            }
            Err(err) => {
                tracing::warn!("Push trigger for repository {} rejected: {:?}", repository_id, err)
            }
        }
    });

    StatusCode::ACCEPTED
}
