use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::coordinates::{NormalizedPoint, NormalizedRect};

pub mod draft;
pub mod media;
pub mod progress;
pub mod template;

pub use media::{MediaRef, MediaView};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HotspotObjective {
    #[default]
    #[serde(alias = "makharij")]
    ArticulationPoint,
    #[serde(alias = "tajweed-rule")]
    RuleHighlight,
    CommonMistake,
    Listening,
    #[serde(alias = "memorization")]
    MemorizationSupport,
}

impl HotspotObjective {
    pub fn as_str(&self) -> &'static str {
        match self {
            HotspotObjective::ArticulationPoint => "articulation-point",
            HotspotObjective::RuleHighlight => "rule-highlight",
            HotspotObjective::CommonMistake => "common-mistake",
            HotspotObjective::Listening => "listening",
            HotspotObjective::MemorizationSupport => "memorization-support",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: String,
    pub order: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(alias = "label")]
    pub instruction: String,
    #[serde(default)]
    pub objective: HotspotObjective,
    #[serde(
        default,
        alias = "linearDescription",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Spoken through speech synthesis when no audio can be played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, rename = "audioUrl", skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaRef>,
}

impl Hotspot {
    pub fn rect(&self) -> NormalizedRect {
        NormalizedRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn contains(&self, point: NormalizedPoint) -> bool {
        self.rect().contains(point)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.as_ref().is_some_and(|media| !media.is_empty())
    }

    /// Text to synthesize when the audio cannot be played.
    pub fn speech_text(&self) -> Option<&str> {
        self.text_fallback
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .or_else(|| Some(self.instruction.as_str()).filter(|text| !text.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMode {
    #[default]
    Hotspot,
    Linear,
    Audio,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Draft,
    #[default]
    #[serde(alias = "sent")]
    Assigned,
    Completed,
    Archived,
}

/// Who receives an assignment: a set of classes or a set of students,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ids", rename_all = "lowercase")]
pub enum Recipients {
    Class(BTreeSet<String>),
    Student(BTreeSet<String>),
}

impl Default for Recipients {
    fn default() -> Self {
        Recipients::Class(BTreeSet::new())
    }
}

impl Recipients {
    pub fn classes<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Recipients::Class(ids.into_iter().map(Into::into).collect())
    }

    pub fn students<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Recipients::Student(ids.into_iter().map(Into::into).collect())
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        match self {
            Recipients::Class(ids) | Recipients::Student(ids) => ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    pub fn includes_learner(&self, learner_id: &str, learner_classes: &[String]) -> bool {
        match self {
            Recipients::Class(ids) => learner_classes.iter().any(|class| ids.contains(class)),
            Recipients::Student(ids) => ids.contains(learner_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        rename = "dueDate",
        alias = "expiresAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    #[serde(
        default,
        rename = "imageUrl",
        alias = "image",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<MediaRef>,
    #[serde(default)]
    pub mode: AssignmentMode,
    #[serde(default)]
    pub recipients: Recipients,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
}

impl Assignment {
    pub fn hotspot(&self, hotspot_id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|hotspot| hotspot.id == hotspot_id)
    }

    /// Hotspots in natural reading order, as used by the linear mode.
    pub fn reading_sequence(&self) -> Vec<&Hotspot> {
        let mut ordered: Vec<&Hotspot> = self.hotspots.iter().collect();
        ordered.sort_by_key(|hotspot| hotspot.order);
        ordered
    }

    pub fn objectives_summary(&self) -> BTreeMap<HotspotObjective, usize> {
        let mut summary = BTreeMap::new();
        for hotspot in &self.hotspots {
            *summary.entry(hotspot.objective).or_insert(0) += 1;
        }
        summary
    }

    pub fn is_visible_to(&self, learner_id: &str, learner_classes: &[String]) -> bool {
        !matches!(
            self.status,
            AssignmentStatus::Archived | AssignmentStatus::Draft
        ) && self.recipients.includes_learner(learner_id, learner_classes)
    }
}

/// Body of `POST /assignments`; every media reference is already a URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    #[serde(rename = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub image_url: String,
    pub mode: AssignmentMode,
    pub recipients: Recipients,
    pub hotspots: Vec<Hotspot>,
    pub status: AssignmentStatus,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub url: String,
}

/// Class or student offered for recipient selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_assignment_json() -> serde_json::Value {
        json!({
            "id": "demo-assignment",
            "title": "Surah Al-Fatiha Listening",
            "description": "Listen and repeat.",
            "mode": "hotspot",
            "imageUrl": "/mushaf-page.jpg",
            "recipients": { "type": "class", "ids": ["foundation"] },
            "hotspots": [
                {
                    "id": "middle-ayah",
                    "order": 2,
                    "x": 0.52, "y": 0.48, "width": 0.14, "height": 0.14,
                    "instruction": "Pay attention to the elongation rules.",
                    "objective": "tajweed-rule",
                    "textFallback": "Sustain the madd for two counts.",
                    "audioUrl": "https://cdn.example/madd.mp3"
                },
                {
                    "id": "intro-ayah",
                    "order": 1,
                    "x": 0.18, "y": 0.28, "width": 0.16, "height": 0.16,
                    "instruction": "Listen to the Bismillah.",
                    "objective": "makharij"
                }
            ],
            "status": "sent",
            "createdAt": "2026-01-05T10:00:00Z",
            "createdBy": "Ustadha Maryam",
            "expiresAt": "2026-04-05T10:00:00Z"
        })
    }

    #[test]
    fn legacy_wire_names_are_accepted() {
        let assignment: Assignment = serde_json::from_value(legacy_assignment_json()).unwrap();

        assert_eq!(assignment.status, AssignmentStatus::Assigned);
        assert_eq!(assignment.hotspots[0].objective, HotspotObjective::RuleHighlight);
        assert_eq!(assignment.hotspots[1].objective, HotspotObjective::ArticulationPoint);
        assert!(assignment.due_at.is_some());
        assert_eq!(
            assignment.recipients,
            Recipients::classes(["foundation"])
        );
        assert!(assignment.hotspots[0].has_audio());
        assert!(!assignment.hotspots[1].has_audio());
    }

    #[test]
    fn reading_sequence_follows_order() {
        let assignment: Assignment = serde_json::from_value(legacy_assignment_json()).unwrap();
        let ids: Vec<&str> = assignment
            .reading_sequence()
            .iter()
            .map(|hotspot| hotspot.id.as_str())
            .collect();
        assert_eq!(ids, vec!["intro-ayah", "middle-ayah"]);
    }

    #[test]
    fn visibility_respects_recipients_and_status() {
        let mut assignment: Assignment =
            serde_json::from_value(legacy_assignment_json()).unwrap();
        let classes = vec!["foundation".to_string()];

        assert!(assignment.is_visible_to("amina", &classes));
        assert!(!assignment.is_visible_to("amina", &[]));

        assignment.status = AssignmentStatus::Archived;
        assert!(!assignment.is_visible_to("amina", &classes));

        assignment.status = AssignmentStatus::Assigned;
        assignment.recipients = Recipients::students(["amina"]);
        assert!(assignment.is_visible_to("amina", &[]));
        assert!(!assignment.is_visible_to("hassan", &classes));
    }

    #[test]
    fn speech_text_prefers_the_fallback() {
        let assignment: Assignment = serde_json::from_value(legacy_assignment_json()).unwrap();
        assert_eq!(
            assignment.hotspots[0].speech_text(),
            Some("Sustain the madd for two counts.")
        );
        assert_eq!(
            assignment.hotspots[1].speech_text(),
            Some("Listen to the Bismillah.")
        );
    }

    #[test]
    fn objectives_are_counted() {
        let assignment: Assignment = serde_json::from_value(legacy_assignment_json()).unwrap();
        let summary = assignment.objectives_summary();
        assert_eq!(summary.get(&HotspotObjective::RuleHighlight), Some(&1));
        assert_eq!(summary.get(&HotspotObjective::ArticulationPoint), Some(&1));
    }
}
