use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EditorSettings;
use crate::error::{EngineError, EngineResult};
use crate::models::draft::{AssignmentDetails, AuthoringSession};
use crate::models::{Hotspot, HotspotObjective, MediaRef};
use crate::utils::coordinates::{
    clamp_size, clamp_unit, to_normalized, to_pixels, CanvasBounds, NormalizedPoint,
    NormalizedRect, PixelRect, PointerPosition, DEFAULT_HOTSPOT_SIZE,
};

pub const NEW_HOTSPOT_PROMPT: &str = "Describe the objective for this hotspot.";
const NO_IMAGE_MESSAGE: &str = "Upload a worksheet image before adding hotspots.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorMode {
    NoImage,
    Idle,
    Placing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotPatch {
    pub instruction: Option<String>,
    pub objective: Option<HotspotObjective>,
    pub description: Option<String>,
    pub text_fallback: Option<String>,
    pub transliteration: Option<String>,
    pub icon: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum EditorCommand {
    LoadImage {
        image: MediaRef,
    },
    ClearImage,
    BeginPlacement,
    CancelPlacement,
    PointerDown {
        pointer: PointerPosition,
        bounds: CanvasBounds,
    },
    MoveCrosshair {
        direction: Direction,
        #[serde(default)]
        coarse: bool,
    },
    ConfirmCrosshair,
    Select {
        hotspot_id: String,
    },
    ClearSelection,
    UpdateHotspot {
        hotspot_id: String,
        patch: HotspotPatch,
    },
    RemoveHotspot {
        hotspot_id: String,
    },
    AttachAudio {
        hotspot_id: String,
        audio: MediaRef,
    },
    ClearAudio {
        hotspot_id: String,
    },
}

impl EditorCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditorCommand::LoadImage { .. } => "load-image",
            EditorCommand::ClearImage => "clear-image",
            EditorCommand::BeginPlacement => "begin-placement",
            EditorCommand::CancelPlacement => "cancel-placement",
            EditorCommand::PointerDown { .. } => "pointer-down",
            EditorCommand::MoveCrosshair { .. } => "move-crosshair",
            EditorCommand::ConfirmCrosshair => "confirm-crosshair",
            EditorCommand::Select { .. } => "select",
            EditorCommand::ClearSelection => "clear-selection",
            EditorCommand::UpdateHotspot { .. } => "update-hotspot",
            EditorCommand::RemoveHotspot { .. } => "remove-hotspot",
            EditorCommand::AttachAudio { .. } => "attach-audio",
            EditorCommand::ClearAudio { .. } => "clear-audio",
        }
    }

    /// Whether the command can change what gets persisted in a draft.
    pub fn mutates_draft(&self) -> bool {
        !matches!(
            self,
            EditorCommand::BeginPlacement
                | EditorCommand::CancelPlacement
                | EditorCommand::MoveCrosshair { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum EditorEvent {
    ImageLoaded { discarded_hotspots: usize },
    ImageCleared { discarded_hotspots: usize },
    PlacementStarted,
    PlacementCancelled,
    HotspotPlaced { hotspot_id: String, order: u32 },
    Selected { hotspot_id: String },
    SelectionCleared,
    CrosshairMoved { x: f64, y: f64 },
    HotspotUpdated { hotspot_id: String },
    HotspotRemoved { hotspot_id: String },
    AudioAttached { hotspot_id: String },
    AudioCleared { hotspot_id: String },
    Ignored,
}

/// State machine behind the hotspot canvas: `NoImage -> Idle <-> Placing`,
/// with an orthogonal selection. Every transition swaps in a new session
/// value.
#[derive(Debug, Clone)]
pub struct CanvasEditor {
    session: AuthoringSession,
    mode: EditorMode,
    crosshair: NormalizedPoint,
    settings: EditorSettings,
}

impl CanvasEditor {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            session: AuthoringSession::default(),
            mode: EditorMode::NoImage,
            crosshair: NormalizedPoint::center(),
            settings,
        }
    }

    pub fn session(&self) -> &AuthoringSession {
        &self.session
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn crosshair(&self) -> NormalizedPoint {
        self.crosshair
    }

    /// Swaps in a restored or template-built session.
    pub fn replace_session(&mut self, session: AuthoringSession) {
        self.mode = if session.has_image() {
            EditorMode::Idle
        } else {
            EditorMode::NoImage
        };
        self.crosshair = NormalizedPoint::center();
        self.session = session;
    }

    pub fn update_details(&mut self, details: AssignmentDetails) {
        self.commit(AuthoringSession {
            details,
            ..self.session.clone()
        });
    }

    /// Topmost hotspot under `point`; later hotspots are drawn above earlier ones.
    pub fn hit_test(&self, point: NormalizedPoint) -> Option<&Hotspot> {
        self.session
            .hotspots
            .iter()
            .rev()
            .find(|hotspot| hotspot.contains(point))
    }

    pub fn overlays(&self, bounds: CanvasBounds) -> Vec<(String, PixelRect)> {
        self.session
            .hotspots
            .iter()
            .map(|hotspot| (hotspot.id.clone(), to_pixels(hotspot.rect(), bounds)))
            .collect()
    }

    pub fn apply(&mut self, command: EditorCommand) -> EngineResult<EditorEvent> {
        let mut next = self.session.clone();

        let event = match command {
            EditorCommand::LoadImage { image } => {
                if image.is_empty() {
                    return Err(EngineError::validation("The selected image is empty."));
                }
                let discarded = next.hotspots.len();
                next.image = Some(image);
                next.hotspots.clear();
                next.selected = None;
                self.mode = EditorMode::Idle;
                self.crosshair = NormalizedPoint::center();
                EditorEvent::ImageLoaded {
                    discarded_hotspots: discarded,
                }
            }
            EditorCommand::ClearImage => {
                let discarded = next.hotspots.len();
                next.image = None;
                next.hotspots.clear();
                next.selected = None;
                self.mode = EditorMode::NoImage;
                EditorEvent::ImageCleared {
                    discarded_hotspots: discarded,
                }
            }
            EditorCommand::BeginPlacement => {
                self.require_image()?;
                self.mode = EditorMode::Placing;
                return Ok(EditorEvent::PlacementStarted);
            }
            EditorCommand::CancelPlacement => {
                if self.mode == EditorMode::Placing {
                    self.mode = EditorMode::Idle;
                }
                return Ok(EditorEvent::PlacementCancelled);
            }
            EditorCommand::PointerDown { pointer, bounds } => {
                if self.mode == EditorMode::NoImage {
                    return Ok(EditorEvent::Ignored);
                }
                let point = to_normalized(pointer, bounds);
                if let Some(hit) = self.hit_test(point) {
                    next.selected = Some(hit.id.clone());
                    EditorEvent::Selected {
                        hotspot_id: hit.id.clone(),
                    }
                } else if self.mode == EditorMode::Placing {
                    self.crosshair = point;
                    self.mode = EditorMode::Idle;
                    place_hotspot(&mut next, point)
                } else {
                    return Ok(EditorEvent::Ignored);
                }
            }
            EditorCommand::MoveCrosshair { direction, coarse } => {
                self.require_image()?;
                let step = if coarse {
                    self.settings.keyboard_coarse_step
                } else {
                    self.settings.keyboard_step
                };
                let (dx, dy) = match direction {
                    Direction::Up => (0.0, -step),
                    Direction::Down => (0.0, step),
                    Direction::Left => (-step, 0.0),
                    Direction::Right => (step, 0.0),
                };
                self.crosshair = self.crosshair.offset(dx, dy);
                return Ok(EditorEvent::CrosshairMoved {
                    x: self.crosshair.x,
                    y: self.crosshair.y,
                });
            }
            EditorCommand::ConfirmCrosshair => {
                self.require_image()?;
                self.mode = EditorMode::Idle;
                place_hotspot(&mut next, self.crosshair)
            }
            EditorCommand::Select { hotspot_id } => {
                find_hotspot(&mut next, &hotspot_id)?;
                next.selected = Some(hotspot_id.clone());
                EditorEvent::Selected { hotspot_id }
            }
            EditorCommand::ClearSelection => {
                next.selected = None;
                EditorEvent::SelectionCleared
            }
            EditorCommand::UpdateHotspot { hotspot_id, patch } => {
                let hotspot = find_hotspot(&mut next, &hotspot_id)?;
                apply_patch(hotspot, patch);
                EditorEvent::HotspotUpdated { hotspot_id }
            }
            EditorCommand::RemoveHotspot { hotspot_id } => {
                let before = next.hotspots.len();
                next.hotspots.retain(|hotspot| hotspot.id != hotspot_id);
                if next.hotspots.len() == before {
                    return Err(EngineError::not_found("hotspot", hotspot_id));
                }
                renumber(&mut next.hotspots);
                if next.selected.as_deref() == Some(hotspot_id.as_str()) {
                    next.selected = None;
                }
                EditorEvent::HotspotRemoved { hotspot_id }
            }
            EditorCommand::AttachAudio { hotspot_id, audio } => {
                if audio.is_empty() {
                    return Err(EngineError::validation("The recorded audio is empty."));
                }
                find_hotspot(&mut next, &hotspot_id)?.audio = Some(audio);
                EditorEvent::AudioAttached { hotspot_id }
            }
            EditorCommand::ClearAudio { hotspot_id } => {
                find_hotspot(&mut next, &hotspot_id)?.audio = None;
                EditorEvent::AudioCleared { hotspot_id }
            }
        };

        self.commit(next);
        Ok(event)
    }

    fn commit(&mut self, mut next: AuthoringSession) {
        next.updated_at = Some(Utc::now());
        self.session = next;
    }

    fn require_image(&self) -> EngineResult<()> {
        if self.mode == EditorMode::NoImage {
            return Err(EngineError::InvalidState(NO_IMAGE_MESSAGE.to_string()));
        }
        Ok(())
    }
}

fn find_hotspot<'a>(session: &'a mut AuthoringSession, hotspot_id: &str) -> EngineResult<&'a mut Hotspot> {
    session
        .hotspots
        .iter_mut()
        .find(|hotspot| hotspot.id == hotspot_id)
        .ok_or_else(|| EngineError::not_found("hotspot", hotspot_id))
}

fn place_hotspot(session: &mut AuthoringSession, center: NormalizedPoint) -> EditorEvent {
    let order = session.hotspots.len() as u32 + 1;
    let rect = NormalizedRect::new(center, DEFAULT_HOTSPOT_SIZE, DEFAULT_HOTSPOT_SIZE);
    let hotspot = new_hotspot(order, rect);
    let hotspot_id = hotspot.id.clone();

    tracing::debug!(
        "Hotspot placed: {} #{} at ({:.3}, {:.3})",
        hotspot_id,
        order,
        rect.x,
        rect.y
    );

    session.hotspots.push(hotspot);
    session.selected = Some(hotspot_id.clone());
    EditorEvent::HotspotPlaced { hotspot_id, order }
}

pub fn new_hotspot(order: u32, rect: NormalizedRect) -> Hotspot {
    Hotspot {
        id: Uuid::new_v4().to_string(),
        order,
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
        instruction: format!("Hotspot {}", order),
        objective: HotspotObjective::default(),
        description: Some(NEW_HOTSPOT_PROMPT.to_string()),
        text_fallback: None,
        transliteration: None,
        icon: None,
        audio: None,
    }
}

fn apply_patch(hotspot: &mut Hotspot, patch: HotspotPatch) {
    if let Some(instruction) = patch.instruction {
        hotspot.instruction = instruction;
    }
    if let Some(objective) = patch.objective {
        hotspot.objective = objective;
    }
    if let Some(description) = patch.description {
        hotspot.description = Some(description).filter(|text| !text.trim().is_empty());
    }
    if let Some(text) = patch.text_fallback {
        hotspot.text_fallback = Some(text).filter(|text| !text.trim().is_empty());
    }
    if let Some(text) = patch.transliteration {
        hotspot.transliteration = Some(text).filter(|text| !text.trim().is_empty());
    }
    if let Some(icon) = patch.icon {
        hotspot.icon = Some(icon).filter(|icon| !icon.trim().is_empty());
    }
    if let Some(x) = patch.x {
        hotspot.x = clamp_unit(x);
    }
    if let Some(y) = patch.y {
        hotspot.y = clamp_unit(y);
    }
    if let Some(width) = patch.width {
        hotspot.width = clamp_size(width);
    }
    if let Some(height) = patch.height {
        hotspot.height = clamp_size(height);
    }
}

/// Restores dense 1-based ordering, keeping relative order.
pub fn renumber(hotspots: &mut [Hotspot]) {
    hotspots.sort_by_key(|hotspot| hotspot.order);
    for (index, hotspot) in hotspots.iter_mut().enumerate() {
        hotspot.order = index as u32 + 1;
    }
}
