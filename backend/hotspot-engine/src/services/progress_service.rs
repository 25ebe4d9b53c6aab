use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use crate::error::{EngineError, EngineResult};
use crate::metrics::HOTSPOT_INTERACTIONS_TOTAL;
use crate::models::progress::{InteractionOutcome, ProgressEvent, ProgressRecord, ProgressSummary};
use crate::models::{Assignment, AssignmentStatus};

const EVENT_BUFFER: usize = 32;

/// Per-learner record of which hotspots have been heard. Completion is
/// reached exactly once per assignment.
pub struct ProgressTracker {
    learner_id: String,
    records: RwLock<HashMap<String, ProgressRecord>>,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressTracker {
    pub fn new(learner_id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            learner_id: learner_id.into(),
            records: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub async fn record_interaction(
        &self,
        assignment: &Assignment,
        hotspot_id: &str,
    ) -> EngineResult<InteractionOutcome> {
        if assignment.hotspot(hotspot_id).is_none() {
            HOTSPOT_INTERACTIONS_TOTAL.with_label_values(&["unknown"]).inc();
            return Err(EngineError::not_found("hotspot", hotspot_id));
        }

        let mut records = self.records.write().await;
        let record = records
            .entry(assignment.id.clone())
            .or_insert_with(|| ProgressRecord::new(&assignment.id, &self.learner_id));

        let newly_completed = record.completed_hotspot_ids.insert(hotspot_id.to_string());
        if !newly_completed {
            HOTSPOT_INTERACTIONS_TOTAL.with_label_values(&["repeat"]).inc();
            return Ok(InteractionOutcome {
                newly_completed: false,
                assignment_now_complete: false,
            });
        }

        let now = Utc::now();
        record.last_updated_at = now;
        HOTSPOT_INTERACTIONS_TOTAL.with_label_values(&["new"]).inc();

        let total = assignment.hotspots.len();
        let done = record
            .completed_hotspot_ids
            .iter()
            .filter(|id| assignment.hotspot(id).is_some())
            .count();
        let assignment_now_complete = total > 0 && done == total && record.completed_at.is_none();

        if assignment_now_complete {
            record.completed_at = Some(now);
            tracing::info!(
                "Assignment completed: {} by learner {}",
                assignment.id,
                self.learner_id
            );
            // No subscribers is fine.
            let _ = self.events.send(ProgressEvent::AssignmentCompleted {
                assignment_id: assignment.id.clone(),
                learner_id: self.learner_id.clone(),
                title: assignment.title.clone(),
                message: format!("{} completed. Excellent work!", assignment.title),
                completed_at: now,
            });
        } else {
            tracing::debug!(
                "Hotspot {} heard in {} ({}/{})",
                hotspot_id,
                assignment.id,
                done,
                total
            );
        }

        Ok(InteractionOutcome {
            newly_completed,
            assignment_now_complete,
        })
    }

    pub async fn completion_ratio(&self, assignment: &Assignment) -> f64 {
        let total = assignment.hotspots.len();
        if total == 0 {
            return 0.0;
        }
        let records = self.records.read().await;
        let done = records
            .get(&assignment.id)
            .map(|record| {
                record
                    .completed_hotspot_ids
                    .iter()
                    .filter(|id| assignment.hotspot(id).is_some())
                    .count()
            })
            .unwrap_or(0);
        done as f64 / total as f64
    }

    /// Assignment status as seen by this learner.
    pub async fn status(&self, assignment: &Assignment) -> AssignmentStatus {
        let records = self.records.read().await;
        match records.get(&assignment.id) {
            Some(record) if record.is_complete() => AssignmentStatus::Completed,
            _ => assignment.status,
        }
    }

    pub async fn record(&self, assignment_id: &str) -> Option<ProgressRecord> {
        self.records.read().await.get(assignment_id).cloned()
    }

    pub async fn summary(&self, assignment: &Assignment) -> ProgressSummary {
        let completed_hotspot_ids = self
            .record(&assignment.id)
            .await
            .map(|record| record.completed_hotspot_ids.into_iter().collect())
            .unwrap_or_default();

        ProgressSummary {
            assignment_id: assignment.id.clone(),
            learner_id: self.learner_id.clone(),
            completed_hotspot_ids,
            total_hotspots: assignment.hotspots.len(),
            completion_ratio: self.completion_ratio(assignment).await,
            status: self.status(assignment).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment(hotspot_count: usize) -> Assignment {
        let hotspots: Vec<serde_json::Value> = (1..=hotspot_count)
            .map(|n| {
                json!({
                    "id": format!("h{}", n),
                    "order": n,
                    "x": 0.2, "y": 0.2, "width": 0.1, "height": 0.1,
                    "instruction": format!("Hotspot {}", n),
                    "audioUrl": format!("/audio/{}.mp3", n)
                })
            })
            .collect();
        serde_json::from_value(json!({
            "id": "a1",
            "title": "Al-Ikhlas",
            "hotspots": hotspots,
            "createdAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn completion_fires_once_on_the_last_new_hotspot() {
        let tracker = ProgressTracker::new("amina");
        let mut events = tracker.subscribe();
        let assignment = assignment(3);

        let first = tracker.record_interaction(&assignment, "h1").await.unwrap();
        assert!(first.newly_completed && !first.assignment_now_complete);
        tracker.record_interaction(&assignment, "h2").await.unwrap();

        let third = tracker.record_interaction(&assignment, "h3").await.unwrap();
        assert!(third.newly_completed && third.assignment_now_complete);

        let repeat = tracker.record_interaction(&assignment, "h3").await.unwrap();
        assert!(!repeat.newly_completed && !repeat.assignment_now_complete);

        let event = events.try_recv().unwrap();
        assert!(matches!(event, ProgressEvent::AssignmentCompleted { ref title, .. } if title == "Al-Ikhlas"));
        assert!(events.try_recv().is_err());

        assert_eq!(tracker.completion_ratio(&assignment).await, 1.0);
        assert_eq!(tracker.status(&assignment).await, AssignmentStatus::Completed);
    }

    #[tokio::test]
    async fn repeated_interactions_are_idempotent() {
        let tracker = ProgressTracker::new("amina");
        let assignment = assignment(2);

        tracker.record_interaction(&assignment, "h1").await.unwrap();
        let before = tracker.record("a1").await.unwrap();
        tracker.record_interaction(&assignment, "h1").await.unwrap();
        let after = tracker.record("a1").await.unwrap();

        assert_eq!(before.completed_hotspot_ids, after.completed_hotspot_ids);
        assert_eq!(tracker.completion_ratio(&assignment).await, 0.5);
    }

    #[tokio::test]
    async fn unknown_hotspots_are_rejected_and_not_recorded() {
        let tracker = ProgressTracker::new("amina");
        let assignment = assignment(1);

        let err = tracker.record_interaction(&assignment, "ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "hotspot", .. }));
        assert!(tracker.record("a1").await.is_none());
    }

    #[tokio::test]
    async fn empty_assignments_never_complete() {
        let tracker = ProgressTracker::new("amina");
        let assignment = assignment(0);
        assert_eq!(tracker.completion_ratio(&assignment).await, 0.0);
        assert_eq!(tracker.summary(&assignment).await.total_hotspots, 0);
    }
}
