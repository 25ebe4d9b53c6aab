use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::EngineResult;
use crate::metrics::DRAFT_AUTOSAVES_TOTAL;
use crate::models::draft::AuthoringSession;
use crate::services::draft_codec::DraftCodec;
use crate::services::draft_store::DraftStore;

/// Debounced, last-write-wins persistence of one surface's draft.
///
/// Every mutation bumps a generation counter. A scheduled write only runs if
/// its generation is still the newest once the debounce elapses, and a write
/// never lands after a newer one (or after `clear`).
#[derive(Clone)]
pub struct Autosaver {
    store: Arc<dyn DraftStore>,
    codec: DraftCodec,
    key: String,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    written: Arc<Mutex<u64>>,
}

impl Autosaver {
    pub fn new(
        store: Arc<dyn DraftStore>,
        codec: DraftCodec,
        key: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            store,
            codec,
            key: key.into(),
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            written: Arc::new(Mutex::new(0)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Queues a save of `session`, superseding anything still pending.
    pub fn schedule(&self, session: AuthoringSession) {
        let generation = self.next_generation();
        let saver = self.clone();

        tokio::spawn(async move {
            tokio::time::sleep(saver.debounce).await;
            if saver.generation.load(Ordering::SeqCst) != generation {
                DRAFT_AUTOSAVES_TOTAL.with_label_values(&["superseded"]).inc();
                return;
            }
            saver.write(generation, &session).await;
        });
    }

    /// Saves immediately, cancelling any pending debounced write. Returns
    /// whether the draft reached the store.
    pub async fn flush(&self, session: &AuthoringSession) -> bool {
        let generation = self.next_generation();
        self.write(generation, session).await
    }

    /// Supersedes any scheduled write without touching the store.
    pub fn cancel_pending(&self) {
        self.next_generation();
    }

    /// Drops pending work and deletes the stored draft.
    pub async fn clear(&self) -> EngineResult<()> {
        let generation = self.next_generation();
        let mut written = self.written.lock().await;
        *written = generation;
        self.store.clear(&self.key).await?;
        tracing::info!("Draft discarded: key={}", self.key);
        Ok(())
    }

    /// Loads the stored draft once. A missing or unreadable draft yields an
    /// empty session.
    pub async fn restore(&self) -> AuthoringSession {
        match self.store.load(&self.key).await {
            Ok(Some(raw)) => match self.codec.decode(&raw) {
                Ok(session) => {
                    tracing::info!(
                        "Draft restored: key={}, hotspots={}",
                        self.key,
                        session.hotspots.len()
                    );
                    session
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable draft {}: {}", self.key, e);
                    AuthoringSession::default()
                }
            },
            Ok(None) => AuthoringSession::default(),
            Err(e) => {
                tracing::warn!("Draft restore failed for {}: {}", self.key, e);
                AuthoringSession::default()
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn write(&self, generation: u64, session: &AuthoringSession) -> bool {
        let mut written = self.written.lock().await;
        if *written >= generation {
            DRAFT_AUTOSAVES_TOTAL.with_label_values(&["superseded"]).inc();
            return false;
        }

        let encoded = match self.codec.encode(session) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("PersistenceFailure: could not encode draft {}: {}", self.key, e);
                DRAFT_AUTOSAVES_TOTAL.with_label_values(&["failed"]).inc();
                return false;
            }
        };

        match self.store.save(&self.key, &encoded).await {
            Ok(()) => {
                *written = generation;
                DRAFT_AUTOSAVES_TOTAL.with_label_values(&["saved"]).inc();
                true
            }
            Err(e) => {
                tracing::warn!("PersistenceFailure: draft {} not saved: {}", self.key, e);
                DRAFT_AUTOSAVES_TOTAL.with_label_values(&["failed"]).inc();
                false
            }
        }
    }
}
