//! JSON encoding of authoring sessions, including the local blobs they
//! reference.
//!
//! Remote media stays a URL. Local blobs are inlined as base64 so a draft
//! survives a restart with no network. Decoding registers fresh blob
//! handles, so the registry sees the restored artifacts as live again.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::draft::{AssignmentDetails, AuthoringSession};
use crate::models::{Hotspot, MediaRef};
use crate::services::blob_registry::BlobRegistry;

pub const DRAFT_FORMAT_VERSION: u32 = 1;

lazy_static! {
    static ref DATA_URL: Regex =
        Regex::new(r"^data:(?P<mime>[^;,]*)(?P<params>(;[^;,]+)*),(?P<payload>.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EncodedMedia {
    Remote { url: String },
    Inline { mime: String, name: String, data: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedHotspot {
    #[serde(flatten)]
    pub hotspot: Hotspot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<EncodedMedia>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedDraft {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub details: AssignmentDetails,
    #[serde(default)]
    pub image: Option<EncodedMedia>,
    #[serde(default)]
    pub hotspots: Vec<EncodedHotspot>,
    #[serde(default)]
    pub selected: Option<String>,
}

#[derive(Clone)]
pub struct DraftCodec {
    registry: BlobRegistry,
}

impl DraftCodec {
    pub fn new(registry: BlobRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BlobRegistry {
        &self.registry
    }

    pub fn encode(&self, session: &AuthoringSession) -> EngineResult<String> {
        let draft = EncodedDraft {
            version: DRAFT_FORMAT_VERSION,
            saved_at: Utc::now(),
            details: session.details.clone(),
            image: session.image.as_ref().map(encode_media),
            hotspots: encode_hotspots(&session.hotspots),
            selected: session.selected.clone(),
        };

        serde_json::to_string(&draft)
            .map_err(|e| EngineError::Codec(format!("Failed to encode draft: {}", e)))
    }

    pub fn decode(&self, raw: &str) -> EngineResult<AuthoringSession> {
        let draft: EncodedDraft = serde_json::from_str(raw)
            .map_err(|e| EngineError::Codec(format!("Failed to parse draft: {}", e)))?;

        if draft.version != DRAFT_FORMAT_VERSION {
            return Err(EngineError::Codec(format!(
                "Unsupported draft version {}",
                draft.version
            )));
        }

        let image = draft
            .image
            .as_ref()
            .map(|media| self.decode_media(media))
            .transpose()?;
        let hotspots = self.decode_hotspots(draft.hotspots)?;
        let selected = draft
            .selected
            .filter(|id| hotspots.iter().any(|hotspot| &hotspot.id == id));

        Ok(AuthoringSession {
            details: draft.details,
            image,
            hotspots,
            selected,
            updated_at: Some(draft.saved_at),
        })
    }

    pub fn decode_media(&self, media: &EncodedMedia) -> EngineResult<MediaRef> {
        match media {
            EncodedMedia::Remote { url } => Ok(MediaRef::Remote(url.clone())),
            EncodedMedia::Inline { mime, name, data } => {
                let bytes = general_purpose::STANDARD.decode(data).map_err(|e| {
                    EngineError::Codec(format!("Inline media {} is not valid base64: {}", name, e))
                })?;
                Ok(MediaRef::Local(self.registry.register(bytes, mime.clone(), name.clone())))
            }
        }
    }

    pub fn decode_hotspots(&self, encoded: Vec<EncodedHotspot>) -> EngineResult<Vec<Hotspot>> {
        encoded
            .into_iter()
            .map(|entry| {
                let mut hotspot = entry.hotspot;
                hotspot.audio = entry
                    .media
                    .as_ref()
                    .map(|media| self.decode_media(media))
                    .transpose()?;
                Ok(hotspot)
            })
            .collect()
    }

    /// Turns a `data:` URL into a local blob.
    pub fn import_data_url(&self, url: &str, name: &str) -> EngineResult<MediaRef> {
        let (mime, bytes) = parse_data_url(url)?;
        Ok(MediaRef::Local(self.registry.register(bytes, mime, name)))
    }
}

pub fn encode_media(media: &MediaRef) -> EncodedMedia {
    match media {
        MediaRef::Remote(url) => EncodedMedia::Remote { url: url.clone() },
        MediaRef::Local(handle) => EncodedMedia::Inline {
            mime: handle.mime().to_string(),
            name: handle.name().to_string(),
            data: general_purpose::STANDARD.encode(handle.bytes()),
        },
    }
}

pub fn encode_hotspots(hotspots: &[Hotspot]) -> Vec<EncodedHotspot> {
    hotspots
        .iter()
        .map(|hotspot| {
            let media = hotspot.audio.as_ref().map(encode_media);
            EncodedHotspot {
                hotspot: Hotspot {
                    audio: None,
                    ..hotspot.clone()
                },
                media,
            }
        })
        .collect()
}

/// Splits `data:<mime>[;base64],<payload>` into its mime type and bytes.
pub fn parse_data_url(url: &str) -> EngineResult<(String, Vec<u8>)> {
    let captures = DATA_URL
        .captures(url.trim())
        .ok_or_else(|| EngineError::Codec("Not a data URL".to_string()))?;

    let mime = match captures.name("mime").map(|m| m.as_str()) {
        Some(mime) if !mime.is_empty() => mime.to_string(),
        _ => "text/plain".to_string(),
    };
    let is_base64 = captures
        .name("params")
        .is_some_and(|params| params.as_str().split(';').any(|p| p == "base64"));
    let payload = captures.name("payload").map(|m| m.as_str()).unwrap_or("");

    let bytes = if is_base64 {
        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| EngineError::Codec(format!("Data URL payload is not valid base64: {}", e)))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok((mime, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HotspotObjective, Recipients};

    fn hotspot(id: &str, order: u32, audio: Option<MediaRef>) -> Hotspot {
        Hotspot {
            id: id.to_string(),
            order,
            x: 0.25 * order as f64,
            y: 0.4,
            width: 0.14,
            height: 0.14,
            instruction: format!("Hotspot {}", order),
            objective: HotspotObjective::Listening,
            description: None,
            text_fallback: None,
            transliteration: Some("bismillah".to_string()),
            icon: None,
            audio,
        }
    }

    #[test]
    fn local_blobs_survive_a_round_trip() {
        let registry = BlobRegistry::new();
        let codec = DraftCodec::new(registry.clone());

        let image = registry.register(vec![137, 80, 78, 71], "image/png", "page.png");
        let first = registry.register(vec![1, 2, 3], "audio/webm", "first.webm");
        let second = registry.register(vec![4, 5], "audio/webm", "second.webm");

        let session = AuthoringSession {
            details: AssignmentDetails {
                title: "Makharij drill".to_string(),
                due_date: "2026-05-01".to_string(),
                recipients: Recipients::classes(["hifz-a"]),
                ..Default::default()
            },
            image: Some(MediaRef::Local(image)),
            hotspots: vec![
                hotspot("h1", 1, Some(MediaRef::Local(first))),
                hotspot("h2", 2, Some(MediaRef::Local(second))),
                hotspot("h3", 3, Some(MediaRef::remote("https://cdn.example/h3.mp3"))),
            ],
            selected: Some("h2".to_string()),
            updated_at: None,
        };

        let raw = codec.encode(&session).unwrap();
        let restored = codec.decode(&raw).unwrap();

        assert_eq!(restored.details, session.details);
        assert_eq!(restored.selected.as_deref(), Some("h2"));
        let image = restored.image.as_ref().and_then(MediaRef::as_local).unwrap();
        assert_eq!(image.bytes(), &[137, 80, 78, 71]);
        assert_eq!(image.mime(), "image/png");

        let audio: Vec<Vec<u8>> = restored.hotspots[..2]
            .iter()
            .map(|h| h.audio.as_ref().and_then(MediaRef::as_local).unwrap().bytes().to_vec())
            .collect();
        assert_eq!(audio, vec![vec![1, 2, 3], vec![4, 5]]);
        assert_eq!(
            restored.hotspots[2].audio,
            Some(MediaRef::remote("https://cdn.example/h3.mp3"))
        );
        assert_eq!(restored.hotspots[0].transliteration.as_deref(), Some("bismillah"));
        // Originals plus the three restored copies.
        assert_eq!(registry.live_count(), 6);
    }

    #[test]
    fn unknown_versions_and_garbage_are_codec_errors() {
        let codec = DraftCodec::new(BlobRegistry::new());
        assert!(matches!(codec.decode("{not json"), Err(EngineError::Codec(_))));

        let future = r#"{"version":99,"savedAt":"2026-01-01T00:00:00Z","details":{}}"#;
        assert!(matches!(codec.decode(future), Err(EngineError::Codec(_))));
    }

    #[test]
    fn dangling_selection_is_dropped() {
        let codec = DraftCodec::new(BlobRegistry::new());
        let raw = r#"{"version":1,"savedAt":"2026-01-01T00:00:00Z","details":{},"selected":"gone"}"#;
        assert_eq!(codec.decode(raw).unwrap().selected, None);
    }

    #[test]
    fn data_urls_are_parsed() {
        let (mime, bytes) = parse_data_url("data:image/png;base64,iVBORw==").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![0x89, 0x50, 0x4e, 0x47]);

        let (mime, bytes) = parse_data_url("data:,hello").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"hello".to_vec());

        assert!(parse_data_url("https://cdn.example/page.png").is_err());
    }
}
