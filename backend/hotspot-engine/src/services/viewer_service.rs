use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::LearnerSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::progress::{InteractionOutcome, ProgressSummary};
use crate::models::Assignment;
use crate::services::api_client::AssignmentApi;
use crate::services::media_service::{MediaManager, PlaybackOutcome, PlaybackRequest, PlaybackSource};
use crate::services::progress_service::ProgressTracker;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResult {
    #[serde(flatten)]
    pub outcome: InteractionOutcome,
    pub playback: Option<PlaybackOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_error: Option<String>,
    pub progress: ProgressSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCard {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub completion_ratio: f64,
}

/// Learner side: which assignments are visible, and what happens when a
/// hotspot is tapped.
pub struct ViewerService {
    api: Arc<dyn AssignmentApi>,
    tracker: Arc<ProgressTracker>,
    media: Arc<MediaManager>,
    learner: LearnerSettings,
    catalog: RwLock<HashMap<String, Assignment>>,
}

impl ViewerService {
    pub fn new(
        api: Arc<dyn AssignmentApi>,
        tracker: Arc<ProgressTracker>,
        media: Arc<MediaManager>,
        learner: LearnerSettings,
    ) -> Self {
        Self {
            api,
            tracker,
            media,
            learner,
            catalog: RwLock::new(HashMap::new()),
        }
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Non-archived assignments addressed to the learner or one of their
    /// classes, newest catalog first.
    pub async fn visible_assignments(&self) -> EngineResult<Vec<AssignmentCard>> {
        let assignments = self.api.list_assignments().await?;
        let visible: Vec<Assignment> = assignments
            .into_iter()
            .filter(|assignment| assignment.is_visible_to(&self.learner.id, &self.learner.classes))
            .collect();

        {
            let mut catalog = self.catalog.write().await;
            catalog.clear();
            for assignment in &visible {
                catalog.insert(assignment.id.clone(), assignment.clone());
            }
        }

        tracing::debug!(
            "Assignments visible to {}: {}",
            self.learner.id,
            visible.len()
        );

        let mut cards = Vec::with_capacity(visible.len());
        for assignment in visible {
            let completion_ratio = self.tracker.completion_ratio(&assignment).await;
            let status = self.tracker.status(&assignment).await;
            cards.push(AssignmentCard {
                assignment: Assignment {
                    status,
                    ..assignment
                },
                completion_ratio,
            });
        }
        Ok(cards)
    }

    pub async fn assignment(&self, assignment_id: &str) -> EngineResult<Assignment> {
        if let Some(found) = self.catalog.read().await.get(assignment_id) {
            return Ok(found.clone());
        }
        self.visible_assignments().await?;
        self.catalog
            .read()
            .await
            .get(assignment_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("assignment", assignment_id))
    }

    /// Records the interaction, then plays the hotspot's audio. A playback
    /// failure is reported alongside the recorded progress.
    pub async fn interact(
        &self,
        assignment_id: &str,
        hotspot_id: &str,
    ) -> EngineResult<InteractionResult> {
        let assignment = self.assignment(assignment_id).await?;
        let outcome = self.tracker.record_interaction(&assignment, hotspot_id).await?;

        let hotspot = assignment
            .hotspot(hotspot_id)
            .ok_or_else(|| EngineError::not_found("hotspot", hotspot_id))?;

        let request = PlaybackRequest {
            hotspot_id: hotspot.id.clone(),
            source: hotspot.audio.as_ref().map(PlaybackSource::from),
            fallback_text: hotspot.speech_text().map(str::to_string),
        };

        let (playback, playback_error) = match self.media.play(request).await {
            Ok(playback) => (Some(playback), None),
            Err(e) => {
                tracing::warn!("Playback for hotspot {} failed: {}", hotspot_id, e);
                (None, Some(e.to_string()))
            }
        };

        Ok(InteractionResult {
            outcome,
            playback,
            playback_error,
            progress: self.tracker.summary(&assignment).await,
        })
    }

    pub async fn progress(&self, assignment_id: &str) -> EngineResult<ProgressSummary> {
        let assignment = self.assignment(assignment_id).await?;
        Ok(self.tracker.summary(&assignment).await)
    }

    pub fn stop_playback(&self) {
        self.media.stop();
    }
}
