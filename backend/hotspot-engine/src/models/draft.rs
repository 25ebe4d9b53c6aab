use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AssignmentMode, Hotspot, HotspotObjective, MediaRef, MediaView, Recipients};

/// The three places an assignment can be authored from. Each keeps its own
/// draft under a fixed key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AuthoringSurface {
    TeacherAuthoring,
    AssignmentSystem,
    Qaidah,
}

impl AuthoringSurface {
    pub const ALL: [AuthoringSurface; 3] = [
        AuthoringSurface::TeacherAuthoring,
        AuthoringSurface::AssignmentSystem,
        AuthoringSurface::Qaidah,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthoringSurface::TeacherAuthoring => "teacher-authoring",
            AuthoringSurface::AssignmentSystem => "assignment-system",
            AuthoringSurface::Qaidah => "qaidah",
        }
    }

    pub fn draft_key(&self, prefix: &str) -> String {
        format!("{}:{}", prefix, self.as_str())
    }
}

impl fmt::Display for AuthoringSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthoringSurface {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AuthoringSurface::ALL
            .into_iter()
            .find(|surface| surface.as_str() == value)
            .ok_or_else(|| format!("unknown authoring surface: {}", value))
    }
}

/// The details form, kept as the author typed it. `due_date` is
/// `YYYY-MM-DD`, `due_time` is `HH:MM`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentDetails {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub due_time: String,
    pub notes: String,
    pub mode: AssignmentMode,
    pub recipients: Recipients,
    pub created_by: String,
}

/// Everything an author has on the canvas. Replaced wholesale on every
/// editor transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthoringSession {
    pub details: AssignmentDetails,
    pub image: Option<MediaRef>,
    pub hotspots: Vec<Hotspot>,
    pub selected: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuthoringSession {
    pub fn hotspot(&self, hotspot_id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|hotspot| hotspot.id == hotspot_id)
    }

    pub fn has_image(&self) -> bool {
        self.image.as_ref().is_some_and(|image| !image.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.image.is_none() && self.hotspots.is_empty() && self.details == AssignmentDetails::default()
    }

    /// Number of media references that still point at local blobs.
    pub fn local_media_count(&self) -> usize {
        let image = self.image.iter().filter(|media| media.is_local()).count();
        let audio = self
            .hotspots
            .iter()
            .filter_map(|hotspot| hotspot.audio.as_ref())
            .filter(|media| media.is_local())
            .count();
        image + audio
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HotspotView {
    pub id: String,
    pub order: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub instruction: String,
    pub objective: HotspotObjective,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transliteration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaView>,
}

impl From<&Hotspot> for HotspotView {
    fn from(hotspot: &Hotspot) -> Self {
        Self {
            id: hotspot.id.clone(),
            order: hotspot.order,
            x: hotspot.x,
            y: hotspot.y,
            width: hotspot.width,
            height: hotspot.height,
            instruction: hotspot.instruction.clone(),
            objective: hotspot.objective,
            description: hotspot.description.clone(),
            text_fallback: hotspot.text_fallback.clone(),
            transliteration: hotspot.transliteration.clone(),
            icon: hotspot.icon.clone(),
            audio: hotspot.audio.as_ref().map(MediaView::from),
        }
    }
}

/// Client-facing snapshot of an authoring session. Local blobs appear by
/// their `blob:` URL and size, never by content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub details: AssignmentDetails,
    pub image: Option<MediaView>,
    pub hotspots: Vec<HotspotView>,
    pub selected: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&AuthoringSession> for SessionView {
    fn from(session: &AuthoringSession) -> Self {
        Self {
            details: session.details.clone(),
            image: session.image.as_ref().map(MediaView::from),
            hotspots: session.hotspots.iter().map(HotspotView::from).collect(),
            selected: session.selected.clone(),
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_keys_are_fixed_per_surface() {
        assert_eq!(
            AuthoringSurface::Qaidah.draft_key("assignment-drafts"),
            "assignment-drafts:qaidah"
        );
        assert_eq!(
            "teacher-authoring".parse::<AuthoringSurface>(),
            Ok(AuthoringSurface::TeacherAuthoring)
        );
        assert!("student".parse::<AuthoringSurface>().is_err());
    }

    #[test]
    fn details_accept_partial_forms() {
        let details: AssignmentDetails =
            serde_json::from_str(r#"{"title":"Madd practice","dueDate":"2026-03-01"}"#).unwrap();
        assert_eq!(details.title, "Madd practice");
        assert_eq!(details.due_time, "");
        assert!(details.recipients.is_empty());
    }

    #[test]
    fn default_session_is_blank() {
        assert!(AuthoringSession::default().is_blank());
        assert_eq!(AuthoringSession::default().local_media_count(), 0);
    }
}
