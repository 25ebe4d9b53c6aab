use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::{
    error::{EngineError, EngineResult},
    extractors::AppJson,
    models::{draft::AssignmentDetails, draft::AuthoringSurface, MediaRef, RosterEntry},
    services::{
        authoring_service::{AuthoringWorkspace, CommandResult, WorkspaceSnapshot},
        canvas_editor::EditorCommand,
        media_service::RecordingHandle,
        AppState,
    },
};

pub const FILE_NAME_HEADER: &str = "x-file-name";

/// JSON alternative to a raw upload: a remote URL or a `data:` URL.
#[derive(Debug, Deserialize, Validate)]
pub struct MediaLinkRequest {
    #[validate(length(min = 1, message = "Provide a URL for the media."))]
    pub url: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStopped {
    pub duration_ms: i64,
    #[serde(flatten)]
    pub result: CommandResult,
}

fn workspace(state: &AppState, surface: &str) -> EngineResult<Arc<AuthoringWorkspace>> {
    let surface: AuthoringSurface = surface
        .parse()
        .map_err(|_| EngineError::not_found("authoring surface", surface))?;
    Ok(state.workspace(surface))
}

/// GET /api/v1/surfaces/{surface}/session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
) -> EngineResult<Json<WorkspaceSnapshot>> {
    Ok(Json(workspace(&state, &surface)?.snapshot().await))
}

/// POST /api/v1/surfaces/{surface}/session/restore
pub async fn restore_session(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
) -> EngineResult<Json<WorkspaceSnapshot>> {
    let snapshot = workspace(&state, &surface)?.restore().await;
    tracing::info!(
        "Surface mounted: {} ({} hotspots restored)",
        surface,
        snapshot.session.hotspots.len()
    );
    Ok(Json(snapshot))
}

/// PUT /api/v1/surfaces/{surface}/details
pub async fn update_details(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
    AppJson(details): AppJson<AssignmentDetails>,
) -> EngineResult<Json<WorkspaceSnapshot>> {
    Ok(Json(workspace(&state, &surface)?.update_details(details).await))
}

/// POST /api/v1/surfaces/{surface}/commands
pub async fn dispatch_command(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
    AppJson(command): AppJson<EditorCommand>,
) -> EngineResult<Json<CommandResult>> {
    Ok(Json(workspace(&state, &surface)?.dispatch(command).await?))
}

/// POST /api/v1/surfaces/{surface}/image
///
/// Accepts either the raw image bytes with their content type, or a JSON
/// `{ "url": ... }` naming a remote image or carrying a `data:` URL.
pub async fn attach_image(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> EngineResult<Json<CommandResult>> {
    let workspace = workspace(&state, &surface)?;
    let accepted = MediaKind {
        default_name: "worksheet".to_string(),
        rejection: "Choose an image file for the worksheet.",
        accepts: |mime| mime.starts_with("image/"),
    };
    let image = read_media(&state, &headers, body, &accepted)?;

    tracing::info!("Worksheet image attached on {}: {}", surface, image.url());
    Ok(Json(workspace.attach_image(image).await?))
}

/// POST /api/v1/surfaces/{surface}/hotspots/{hotspot_id}/audio
pub async fn attach_audio(
    State(state): State<Arc<AppState>>,
    Path((surface, hotspot_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> EngineResult<Json<CommandResult>> {
    let workspace = workspace(&state, &surface)?;
    let accepted = MediaKind {
        default_name: format!("{}-audio", hotspot_id),
        rejection: "Choose an audio file for the hotspot.",
        accepts: |mime| mime.starts_with("audio/") || mime == "video/webm",
    };
    let audio = read_media(&state, &headers, body, &accepted)?;

    Ok(Json(workspace.attach_audio(&hotspot_id, audio).await?))
}

/// POST /api/v1/surfaces/{surface}/hotspots/{hotspot_id}/recording
pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    Path((surface, hotspot_id)): Path<(String, String)>,
) -> EngineResult<impl IntoResponse> {
    let workspace = workspace(&state, &surface)?;
    if workspace.session().await.hotspot(&hotspot_id).is_none() {
        return Err(EngineError::not_found("hotspot", hotspot_id));
    }

    let handle = state
        .media
        .start_recording(workspace.surface(), &hotspot_id)
        .await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

/// POST /api/v1/surfaces/{surface}/recording/stop
pub async fn stop_recording(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
    AppJson(handle): AppJson<RecordingHandle>,
) -> EngineResult<Json<RecordingStopped>> {
    let workspace = workspace(&state, &surface)?;
    if handle.surface != workspace.surface() {
        return Err(EngineError::InvalidHandle(format!(
            "Recording {} was started on {}, not {}",
            handle.id,
            handle.surface,
            workspace.surface()
        )));
    }
    let artifact = state.media.stop_recording(&handle).await?;
    let result = workspace
        .attach_audio(&artifact.hotspot_id, artifact.media())
        .await?;

    Ok(Json(RecordingStopped {
        duration_ms: artifact.duration_ms,
        result,
    }))
}

/// DELETE /api/v1/surfaces/{surface}/recording
pub async fn cancel_recording(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
) -> EngineResult<impl IntoResponse> {
    workspace(&state, &surface)?;
    let cancelled = state.media.cancel_recording();
    Ok(Json(json!({ "cancelled": cancelled })))
}

/// POST /api/v1/surfaces/{surface}/publish
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
) -> EngineResult<impl IntoResponse> {
    let created = workspace(&state, &surface)?.publish(&state.publisher).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/v1/surfaces/{surface}/draft
pub async fn discard_draft(
    State(state): State<Arc<AppState>>,
    Path(surface): Path<String>,
) -> EngineResult<Json<WorkspaceSnapshot>> {
    let snapshot = workspace(&state, &surface)?.discard().await;
    tracing::info!("Draft discarded: {}", surface);
    Ok(Json(snapshot))
}

/// GET /api/v1/roster/classes
pub async fn list_classes(
    State(state): State<Arc<AppState>>,
) -> EngineResult<Json<Vec<RosterEntry>>> {
    Ok(Json(state.api.list_classes().await?))
}

/// GET /api/v1/roster/students
pub async fn list_students(
    State(state): State<Arc<AppState>>,
) -> EngineResult<Json<Vec<RosterEntry>>> {
    Ok(Json(state.api.list_students().await?))
}

struct MediaKind {
    default_name: String,
    rejection: &'static str,
    accepts: fn(&str) -> bool,
}

/// Turns an upload body into a media reference. Raw bodies become local
/// blobs; JSON bodies name a remote URL or carry a data URL.
fn read_media(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
    kind: &MediaKind,
) -> EngineResult<MediaRef> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();
    let name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(&kind.default_name)
        .to_string();

    if content_type == "application/json" {
        let link: MediaLinkRequest = serde_json::from_slice(&body)
            .map_err(|e| EngineError::Codec(format!("Failed to parse JSON request body: {}", e)))?;
        link.validate()?;

        if link.url.trim_start().starts_with("data:") {
            let media = state
                .codec
                .import_data_url(&link.url, link.name.as_deref().unwrap_or(&name))?;
            let accepted = media
                .as_local()
                .is_some_and(|handle| (kind.accepts)(handle.mime()));
            return if accepted {
                Ok(media)
            } else {
                Err(EngineError::validation(kind.rejection))
            };
        }
        let media = MediaRef::remote(link.url.trim());
        if media.is_transient() {
            return Err(EngineError::validation(
                "Send the file itself; blob: links only work on the device that made them.",
            ));
        }
        return Ok(media);
    }

    if body.is_empty() || !(kind.accepts)(&content_type) {
        tracing::debug!("Rejected upload: content_type={}, bytes={}", content_type, body.len());
        return Err(EngineError::validation(kind.rejection));
    }

    Ok(MediaRef::Local(state.registry.register(
        body.to_vec(),
        content_type,
        name,
    )))
}
