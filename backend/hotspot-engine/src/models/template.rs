use serde::{Deserialize, Serialize};

use super::{Hotspot, MediaRef};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateOrigin {
    #[default]
    Api,
    Local,
}

/// Reusable worksheet layout. Hotspots keep geometry and text; audio is
/// never carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(rename = "imageUrl", alias = "image")]
    pub image: MediaRef,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub origin: TemplateOrigin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub hotspot_count: usize,
    pub origin: TemplateOrigin,
}

impl From<&Template> for TemplateSummary {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            image_url: template.image.url().to_string(),
            hotspot_count: template.hotspots.len(),
            origin: template.origin,
        }
    }
}
