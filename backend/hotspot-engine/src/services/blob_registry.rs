use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use uuid::Uuid;

type Entries = Mutex<HashMap<String, BlobEntry>>;

#[derive(Debug, Clone)]
struct BlobEntry {
    mime: String,
    size: usize,
}

/// Tracks local binary artifacts (recordings, picked images) that have not
/// been uploaded yet. Entries live exactly as long as some `BlobHandle`
/// clone is still held.
#[derive(Clone, Default)]
pub struct BlobRegistry {
    entries: Arc<Entries>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        bytes: Vec<u8>,
        mime: impl Into<String>,
        name: impl Into<String>,
    ) -> BlobHandle {
        let url = format!("blob:local-{}", Uuid::new_v4());
        let mime = mime.into();
        let size = bytes.len();

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                url.clone(),
                BlobEntry {
                    mime: mime.clone(),
                    size,
                },
            );
        }

        tracing::debug!("Blob registered: {} ({} bytes, {})", url, size, mime);

        BlobHandle {
            inner: Arc::new(BlobInner {
                url,
                mime,
                name: name.into(),
                bytes,
                registry: Arc::downgrade(&self.entries),
            }),
        }
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn live_bytes(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().map(|entry| entry.size).sum())
            .unwrap_or(0)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(url))
            .unwrap_or(false)
    }

    pub fn mime_of(&self, url: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(url).map(|entry| entry.mime.clone()))
    }
}

/// Reference-counted handle to a local artifact. Cloning is cheap; the
/// registry entry is released when the last clone is dropped.
#[derive(Clone)]
pub struct BlobHandle {
    inner: Arc<BlobInner>,
}

struct BlobInner {
    url: String,
    mime: String,
    name: String,
    bytes: Vec<u8>,
    registry: Weak<Entries>,
}

impl Drop for BlobInner {
    fn drop(&mut self) {
        if let Some(entries) = self.registry.upgrade() {
            if let Ok(mut entries) = entries.lock() {
                entries.remove(&self.url);
            }
        }
        tracing::debug!("Blob released: {}", self.url);
    }
}

impl BlobHandle {
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn mime(&self) -> &str {
        &self.inner.mime
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.inner.bytes
    }

    pub fn len(&self) -> usize {
        self.inner.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.bytes.is_empty()
    }
}

impl PartialEq for BlobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.url == other.inner.url
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobHandle")
            .field("url", &self.inner.url)
            .field("mime", &self.inner.mime)
            .field("name", &self.inner.name)
            .field("len", &self.inner.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_lives_while_any_clone_is_held() {
        let registry = BlobRegistry::new();
        let handle = registry.register(vec![1, 2, 3], "audio/webm", "take.webm");
        let copy = handle.clone();
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.live_bytes(), 3);

        drop(handle);
        assert!(registry.contains(copy.url()));

        drop(copy);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn urls_are_marked_local() {
        let registry = BlobRegistry::new();
        let handle = registry.register(vec![1], "audio/webm", "take.webm");
        assert!(handle.url().starts_with("blob:local-"));
    }

    #[test]
    fn handles_outliving_the_registry_do_not_panic() {
        let registry = BlobRegistry::new();
        let handle = registry.register(vec![0; 8], "image/png", "page.png");
        drop(registry);
        assert_eq!(handle.len(), 8);
        drop(handle);
    }
}
