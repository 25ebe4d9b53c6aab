use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::draft::AuthoringSession;
use crate::models::template::{Template, TemplateOrigin};
use crate::models::Hotspot;
use crate::services::api_client::AssignmentApi;
use crate::services::canvas_editor::renumber;
use crate::services::draft_codec::{encode_hotspots, encode_media, DraftCodec, EncodedHotspot, EncodedMedia};
use crate::services::draft_store::DraftStore;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTemplate {
    id: String,
    name: String,
    image: EncodedMedia,
    hotspots: Vec<EncodedHotspot>,
}

pub struct TemplateLibrary {
    api: Arc<dyn AssignmentApi>,
    store: Arc<dyn DraftStore>,
    codec: DraftCodec,
    key: String,
    write_lock: Mutex<()>,
}

impl TemplateLibrary {
    pub fn new(
        api: Arc<dyn AssignmentApi>,
        store: Arc<dyn DraftStore>,
        codec: DraftCodec,
        key_prefix: &str,
    ) -> Self {
        Self {
            api,
            store,
            codec,
            key: format!("{}:templates", key_prefix),
            write_lock: Mutex::new(()),
        }
    }

    /// Saves the session's image and hotspot layout as a local template.
    /// Audio is never carried over.
    pub async fn save(&self, name: &str, session: &AuthoringSession) -> EngineResult<Template> {
        let name = name.trim();
        let mut errors = Vec::new();
        if name.is_empty() {
            errors.push("Give the template a name.".to_string());
        }
        let image = session.image.as_ref().filter(|image| !image.is_empty());
        if image.is_none() {
            errors.push("Upload a worksheet image before saving a template.".to_string());
        }
        let (Some(image), true) = (image, errors.is_empty()) else {
            return Err(EngineError::Validation(errors));
        };

        let template = Template {
            id: format!("local-{}", Uuid::new_v4()),
            name: name.to_string(),
            image: image.clone(),
            hotspots: fresh_layout(&session.hotspots),
            origin: TemplateOrigin::Local,
        };

        let _guard = self.write_lock.lock().await;
        let mut stored = self.load_stored().await?;
        stored.push(StoredTemplate {
            id: template.id.clone(),
            name: template.name.clone(),
            image: encode_media(&template.image),
            hotspots: encode_hotspots(&template.hotspots),
        });
        self.write_stored(&stored).await?;

        tracing::info!(
            "Template saved: {} ({} hotspots)",
            template.id,
            template.hotspots.len()
        );
        Ok(template)
    }

    /// Remote catalog first, then local templates. Either side failing
    /// leaves the other.
    pub async fn list(&self) -> EngineResult<Vec<Template>> {
        let mut templates = match self.api.list_templates().await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("Template catalog unavailable, showing local templates only: {}", e);
                Vec::new()
            }
        };
        match self.local_templates().await {
            Ok(local) => templates.extend(local),
            Err(e) => {
                tracing::warn!("Local templates unavailable, showing the catalog only: {}", e);
            }
        }
        Ok(templates)
    }

    pub async fn find(&self, template_id: &str) -> EngineResult<Template> {
        self.list()
            .await?
            .into_iter()
            .find(|template| template.id == template_id)
            .ok_or_else(|| EngineError::not_found("template", template_id))
    }

    /// Starts a fresh session from a template: its image, its layout with
    /// new hotspot ids, no audio.
    pub fn apply(&self, template: &Template) -> AuthoringSession {
        AuthoringSession {
            image: Some(template.image.clone()),
            hotspots: fresh_layout(&template.hotspots),
            ..Default::default()
        }
    }

    pub async fn delete_local(&self, template_id: &str) -> EngineResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.load_stored().await?;
        let before = stored.len();
        stored.retain(|template| template.id != template_id);
        if stored.len() == before {
            return Err(EngineError::not_found("template", template_id));
        }
        self.write_stored(&stored).await?;
        tracing::info!("Template deleted: {}", template_id);
        Ok(())
    }

    /// Stored templates that still decode; broken entries are skipped.
    async fn local_templates(&self) -> EngineResult<Vec<Template>> {
        let templates = self
            .load_stored()
            .await?
            .into_iter()
            .filter_map(|stored| match self.decode_stored(stored) {
                Ok(template) => Some(template),
                Err((id, e)) => {
                    tracing::warn!("Skipping unreadable local template {}: {}", id, e);
                    None
                }
            })
            .collect();
        Ok(templates)
    }

    fn decode_stored(&self, stored: StoredTemplate) -> Result<Template, (String, EngineError)> {
        let image = self
            .codec
            .decode_media(&stored.image)
            .map_err(|e| (stored.id.clone(), e))?;
        let hotspots = self
            .codec
            .decode_hotspots(stored.hotspots)
            .map_err(|e| (stored.id.clone(), e))?;
        Ok(Template {
            id: stored.id,
            name: stored.name,
            image,
            hotspots,
            origin: TemplateOrigin::Local,
        })
    }

    async fn load_stored(&self) -> EngineResult<Vec<StoredTemplate>> {
        match self.store.load(&self.key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(stored) => Ok(stored),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable local templates at {}: {}", self.key, e);
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    async fn write_stored(&self, stored: &[StoredTemplate]) -> EngineResult<()> {
        let raw = serde_json::to_string(stored)
            .map_err(|e| EngineError::Codec(format!("Failed to encode templates: {}", e)))?;
        self.store.save(&self.key, &raw).await
    }
}

/// Copies a hotspot layout with fresh ids, dense ordering and no audio.
fn fresh_layout(hotspots: &[Hotspot]) -> Vec<Hotspot> {
    let mut layout: Vec<Hotspot> = hotspots
        .iter()
        .map(|hotspot| Hotspot {
            id: Uuid::new_v4().to_string(),
            audio: None,
            ..hotspot.clone()
        })
        .collect();
    renumber(&mut layout);
    layout
}
