use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AssignmentStatus;

/// A learner's path through one assignment. Created on first interaction,
/// only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub assignment_id: String,
    pub learner_id: String,
    pub completed_hotspot_ids: BTreeSet<String>,
    pub last_updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn new(assignment_id: impl Into<String>, learner_id: impl Into<String>) -> Self {
        Self {
            assignment_id: assignment_id.into(),
            learner_id: learner_id.into(),
            completed_hotspot_ids: BTreeSet::new(),
            last_updated_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionOutcome {
    pub newly_completed: bool,
    pub assignment_now_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    AssignmentCompleted {
        assignment_id: String,
        learner_id: String,
        title: String,
        message: String,
        completed_at: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ProgressEvent::AssignmentCompleted { .. } => "assignment_completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub assignment_id: String,
    pub learner_id: String,
    pub completed_hotspot_ids: Vec<String>,
    pub total_hotspots: usize,
    pub completion_ratio: f64,
    pub status: AssignmentStatus,
}
