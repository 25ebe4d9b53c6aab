use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::EngineResult,
    models::progress::ProgressSummary,
    services::{
        viewer_service::{AssignmentCard, InteractionResult},
        AppState,
    },
};

/// GET /api/v1/assignments
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
) -> EngineResult<Json<Vec<AssignmentCard>>> {
    Ok(Json(state.viewer.visible_assignments().await?))
}

/// POST /api/v1/assignments/{id}/hotspots/{hotspot_id}/interactions
pub async fn record_interaction(
    State(state): State<Arc<AppState>>,
    Path((assignment_id, hotspot_id)): Path<(String, String)>,
) -> EngineResult<Json<InteractionResult>> {
    let result = state.viewer.interact(&assignment_id, &hotspot_id).await?;
    if result.outcome.assignment_now_complete {
        tracing::info!(
            "Assignment completed: {} by {}",
            assignment_id,
            state.config.learner.id
        );
    }
    Ok(Json(result))
}

/// GET /api/v1/assignments/{id}/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<String>,
) -> EngineResult<Json<ProgressSummary>> {
    Ok(Json(state.viewer.progress(&assignment_id).await?))
}

/// DELETE /api/v1/playback
pub async fn stop_playback(State(state): State<Arc<AppState>>) -> StatusCode {
    state.viewer.stop_playback();
    StatusCode::NO_CONTENT
}
