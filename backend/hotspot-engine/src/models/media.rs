use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::services::blob_registry::BlobHandle;

/// Reference to an image or audio resource: either already durable (a URL
/// the remote service can serve) or a local blob that still has to be
/// uploaded before publish.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRef {
    Remote(String),
    Local(BlobHandle),
}

impl MediaRef {
    pub fn remote(url: impl Into<String>) -> Self {
        MediaRef::Remote(url.into())
    }

    pub fn url(&self) -> &str {
        match self {
            MediaRef::Remote(url) => url,
            MediaRef::Local(handle) => handle.url(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaRef::Local(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MediaRef::Remote(url) => url.trim().is_empty(),
            MediaRef::Local(handle) => handle.is_empty(),
        }
    }

    /// A remote reference that only resolves inside the process that minted
    /// it. It can never be published.
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaRef::Remote(url) if is_transient_url(url))
    }

    pub fn as_local(&self) -> Option<&BlobHandle> {
        match self {
            MediaRef::Local(handle) => Some(handle),
            MediaRef::Remote(_) => None,
        }
    }
}

/// `blob:` and `data:` links point at bytes held by one process, not at a
/// durable resource.
pub fn is_transient_url(url: &str) -> bool {
    let url = url.trim_start();
    url.starts_with("blob:") || url.starts_with("data:")
}

/// Wire form is the plain URL. Local blobs never leave the process through
/// serde; the draft codec and the publish pipeline handle them explicitly.
impl Serialize for MediaRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            MediaRef::Remote(url) => serializer.serialize_str(url),
            MediaRef::Local(handle) => Err(serde::ser::Error::custom(format!(
                "local media {} must be uploaded before it can be serialized",
                handle.url()
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for MediaRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UrlVisitor;

        impl Visitor<'_> for UrlVisitor {
            type Value = MediaRef;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a media URL")
            }

            fn visit_str<E>(self, value: &str) -> Result<MediaRef, E>
            where
                E: de::Error,
            {
                Ok(MediaRef::Remote(value.to_string()))
            }
        }

        deserializer.deserialize_str(UrlVisitor)
    }
}

/// What a client sees for a media reference in session snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaView {
    pub url: String,
    pub local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
}

impl From<&MediaRef> for MediaView {
    fn from(media: &MediaRef) -> Self {
        match media {
            MediaRef::Remote(url) => MediaView {
                url: url.clone(),
                local: false,
                mime: None,
                bytes: None,
            },
            MediaRef::Local(handle) => MediaView {
                url: handle.url().to_string(),
                local: true,
                mime: Some(handle.mime().to_string()),
                bytes: Some(handle.len()),
            },
        }
    }
}
