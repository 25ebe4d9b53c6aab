use std::sync::Arc;

use crate::error::{EngineError, EngineResult};
use crate::metrics::{ASSIGNMENTS_PUBLISHED_TOTAL, MEDIA_UPLOADS_TOTAL};
use crate::models::draft::AuthoringSession;
use crate::models::{Assignment, AssignmentMode, AssignmentStatus, Hotspot, MediaRef, NewAssignment};
use crate::services::api_client::AssignmentApi;
use crate::services::autosave::Autosaver;
use crate::utils::time::combine_due_date;

/// Publish-time checks, in the order they are shown to the author. Pure:
/// no network access.
pub fn validate(session: &AuthoringSession) -> Vec<String> {
    let details = &session.details;
    let mut errors = Vec::new();

    if details.title.trim().is_empty() {
        errors.push("Please provide a title for the assignment.".to_string());
    }
    if details.description.trim().is_empty() {
        errors.push("Add a description so students know what to expect.".to_string());
    }
    if details.due_date.trim().is_empty() {
        errors.push("Select a due date for the assignment.".to_string());
    } else if let Err(message) = combine_due_date(&details.due_date, &details.due_time) {
        errors.push(message);
    }
    if !session.has_image() {
        errors.push("Upload a worksheet image before adding hotspots.".to_string());
    } else if session.image.as_ref().is_some_and(MediaRef::is_transient) {
        errors.push("Upload the worksheet image again; its link has expired.".to_string());
    }
    if details.recipients.is_empty() {
        errors.push("Select at least one class or student.".to_string());
    }

    if details.mode == AssignmentMode::Hotspot {
        if session.has_image() && session.hotspots.is_empty() {
            errors.push("Place at least one hotspot on the worksheet.".to_string());
        }
        let mut ordered: Vec<&Hotspot> = session.hotspots.iter().collect();
        ordered.sort_by_key(|hotspot| hotspot.order);
        for hotspot in ordered.iter().filter(|hotspot| !hotspot.has_audio()) {
            errors.push(format!(
                "Record or attach audio for hotspot {} ({}).",
                hotspot.order, hotspot.instruction
            ));
        }
    }

    let mut with_audio: Vec<&Hotspot> = session.hotspots.iter().collect();
    with_audio.sort_by_key(|hotspot| hotspot.order);
    for hotspot in with_audio
        .into_iter()
        .filter(|hotspot| hotspot.audio.as_ref().is_some_and(MediaRef::is_transient))
    {
        errors.push(format!(
            "Record or attach audio for hotspot {} ({}) again; its link has expired.",
            hotspot.order, hotspot.instruction
        ));
    }

    errors
}

pub struct PublishService {
    api: Arc<dyn AssignmentApi>,
}

impl PublishService {
    pub fn new(api: Arc<dyn AssignmentApi>) -> Self {
        Self { api }
    }

    /// Validates, promotes local media to durable URLs, creates the
    /// assignment and finally deletes the draft. Any failure before creation
    /// leaves the draft untouched.
    pub async fn publish(
        &self,
        session: &AuthoringSession,
        autosaver: &Autosaver,
    ) -> EngineResult<Assignment> {
        let errors = validate(session);
        if !errors.is_empty() {
            ASSIGNMENTS_PUBLISHED_TOTAL.with_label_values(&["invalid"]).inc();
            return Err(EngineError::Validation(errors));
        }

        let request = match self.build_request(session).await {
            Ok(request) => request,
            Err(e) => {
                ASSIGNMENTS_PUBLISHED_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let created = match self.api.create_assignment(&request).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!("Publishing '{}' failed, draft kept: {}", request.title, e);
                ASSIGNMENTS_PUBLISHED_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        ASSIGNMENTS_PUBLISHED_TOTAL.with_label_values(&["published"]).inc();
        tracing::info!(
            "Assignment published: {} ({} hotspots) from {}",
            created.id,
            created.hotspots.len(),
            autosaver.key()
        );

        if let Err(e) = autosaver.clear().await {
            tracing::warn!("Published {} but could not delete draft: {}", created.id, e);
        }

        Ok(created)
    }

    async fn build_request(&self, session: &AuthoringSession) -> EngineResult<NewAssignment> {
        let details = &session.details;
        let due_at = combine_due_date(&details.due_date, &details.due_time)
            .map_err(EngineError::validation)?;

        let image = session
            .image
            .as_ref()
            .ok_or_else(|| EngineError::validation("Upload a worksheet image before adding hotspots."))?;
        let image_url = self.promote(image).await?;

        let mut hotspots = Vec::with_capacity(session.hotspots.len());
        for hotspot in &session.hotspots {
            let audio = match hotspot.audio.as_ref() {
                Some(media) => Some(MediaRef::Remote(self.promote(media).await?)),
                None => None,
            };
            hotspots.push(Hotspot {
                audio,
                ..hotspot.clone()
            });
        }
        hotspots.sort_by_key(|hotspot| hotspot.order);

        Ok(NewAssignment {
            title: details.title.trim().to_string(),
            description: details.description.trim().to_string(),
            due_at,
            notes: details.notes.clone(),
            image_url,
            mode: details.mode,
            recipients: details.recipients.clone(),
            hotspots,
            status: AssignmentStatus::Assigned,
            created_by: if details.created_by.trim().is_empty() {
                "Teacher".to_string()
            } else {
                details.created_by.clone()
            },
        })
    }

    /// Durable URL for a media reference, uploading local blobs.
    async fn promote(&self, media: &MediaRef) -> EngineResult<String> {
        match media {
            MediaRef::Remote(url) if media.is_transient() => Err(EngineError::validation(format!(
                "{} is not a durable link and cannot be published.",
                url
            ))),
            MediaRef::Remote(url) => Ok(url.clone()),
            MediaRef::Local(handle) => {
                match self
                    .api
                    .upload(handle.bytes().to_vec(), handle.name(), handle.mime())
                    .await
                {
                    Ok(url) => {
                        MEDIA_UPLOADS_TOTAL.with_label_values(&["uploaded"]).inc();
                        Ok(url)
                    }
                    Err(e) => {
                        MEDIA_UPLOADS_TOTAL.with_label_values(&["failed"]).inc();
                        tracing::warn!("Upload of {} failed: {}", handle.name(), e);
                        Err(e)
                    }
                }
            }
        }
    }
}
