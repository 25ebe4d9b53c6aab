use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::EngineResult,
    extractors::AppJson,
    models::{draft::AuthoringSurface, template::TemplateSummary},
    services::{authoring_service::WorkspaceSnapshot, AppState},
};

#[derive(Debug, Deserialize, Validate)]
pub struct SaveTemplateRequest {
    pub surface: AuthoringSurface,
    #[validate(length(max = 120, message = "Template names are limited to 120 characters."))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyTemplateRequest {
    pub surface: AuthoringSurface,
}

/// GET /api/v1/templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> EngineResult<Json<Vec<TemplateSummary>>> {
    let templates = state.templates.list().await?;
    Ok(Json(templates.iter().map(TemplateSummary::from).collect()))
}

/// POST /api/v1/templates
pub async fn save_template(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SaveTemplateRequest>,
) -> EngineResult<impl IntoResponse> {
    req.validate()?;

    let template = state
        .workspace(req.surface)
        .save_template(&state.templates, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(TemplateSummary::from(&template))))
}

/// POST /api/v1/templates/{id}/apply
pub async fn apply_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    AppJson(req): AppJson<ApplyTemplateRequest>,
) -> EngineResult<Json<WorkspaceSnapshot>> {
    let template = state.templates.find(&template_id).await?;
    let snapshot = state
        .workspace(req.surface)
        .apply_template(&state.templates, &template)
        .await;
    Ok(Json(snapshot))
}

/// DELETE /api/v1/templates/{id}
pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
) -> EngineResult<StatusCode> {
    state.templates.delete_local(&template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
