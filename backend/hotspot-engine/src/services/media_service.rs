//! Owner of the single microphone and the single playback channel.
//!
//! Device access goes through the [`CaptureDevice`], [`AudioOutput`] and
//! [`SpeechSynthesizer`] seams so hosts can plug in real hardware, a browser
//! bridge, or the headless implementations used by the service binary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::metrics::{MEDIA_PLAYBACK_TOTAL, RECORDING_ACTIVE};
use crate::models::draft::AuthoringSurface;
use crate::models::MediaRef;
use crate::services::blob_registry::{BlobHandle, BlobRegistry};

#[derive(Debug, Clone)]
pub struct CapturedAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquires the microphone. `Err` carries a human readable reason.
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, String>;
}

#[async_trait]
pub trait CaptureStream: Send {
    /// Stops capturing and releases the device, returning what was recorded.
    async fn finish(self: Box<Self>) -> Result<CapturedAudio, String>;

    /// Releases the device and drops whatever was captured.
    fn abort(self: Box<Self>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSource {
    Url(String),
    Blob(BlobHandle),
}

impl PlaybackSource {
    pub fn url(&self) -> &str {
        match self {
            PlaybackSource::Url(url) => url,
            PlaybackSource::Blob(handle) => handle.url(),
        }
    }
}

impl From<&MediaRef> for PlaybackSource {
    fn from(media: &MediaRef) -> Self {
        match media {
            MediaRef::Remote(url) => PlaybackSource::Url(url.clone()),
            MediaRef::Local(handle) => PlaybackSource::Blob(handle.clone()),
        }
    }
}

pub trait PlaybackSink: Send {
    fn stop(&mut self);
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn start(&self, source: PlaybackSource) -> Result<Box<dyn PlaybackSink>, String>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str) -> Result<Box<dyn PlaybackSink>, String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingHandle {
    pub id: u64,
    pub surface: AuthoringSurface,
    pub hotspot_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub surface: AuthoringSurface,
    pub hotspot_id: String,
    pub blob: BlobHandle,
    pub duration_ms: i64,
}

impl AudioArtifact {
    pub fn media(&self) -> MediaRef {
        MediaRef::Local(self.blob.clone())
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub hotspot_id: String,
    pub source: Option<PlaybackSource>,
    pub fallback_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPath {
    Audio,
    Speech,
}

impl PlaybackPath {
    fn as_str(&self) -> &'static str {
        match self {
            PlaybackPath::Audio => "audio",
            PlaybackPath::Speech => "speech",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackOutcome {
    pub hotspot_id: String,
    pub path: PlaybackPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

enum RecordingSlot {
    Idle,
    Acquiring {
        id: u64,
    },
    Recording {
        id: u64,
        surface: AuthoringSurface,
        hotspot_id: String,
        started_at: DateTime<Utc>,
        stream: Box<dyn CaptureStream>,
    },
}

struct ActivePlayback {
    hotspot_id: String,
    sink: Box<dyn PlaybackSink>,
}

pub struct MediaManager {
    capture: Arc<dyn CaptureDevice>,
    output: Arc<dyn AudioOutput>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    registry: BlobRegistry,
    recording: Mutex<RecordingSlot>,
    playback_gate: tokio::sync::Mutex<()>,
    current: Mutex<Option<ActivePlayback>>,
    next_handle: AtomicU64,
}

impl MediaManager {
    pub fn new(
        capture: Arc<dyn CaptureDevice>,
        output: Arc<dyn AudioOutput>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        registry: BlobRegistry,
    ) -> Self {
        Self {
            capture,
            output,
            speech,
            registry,
            recording: Mutex::new(RecordingSlot::Idle),
            playback_gate: tokio::sync::Mutex::new(()),
            current: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Headless manager: no microphone, playback is reported back to the
    /// caller instead of rendered.
    pub fn headless(registry: BlobRegistry) -> Self {
        Self::new(
            Arc::new(NoCaptureDevice),
            Arc::new(HeadlessOutput),
            Some(Arc::new(HeadlessSpeech)),
            registry,
        )
    }

    pub fn is_recording(&self) -> bool {
        self.recording
            .lock()
            .map(|slot| !matches!(*slot, RecordingSlot::Idle))
            .unwrap_or(false)
    }

    pub fn playing_hotspot(&self) -> Option<String> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|active| active.hotspot_id.clone()))
    }

    pub async fn start_recording(
        &self,
        surface: AuthoringSurface,
        hotspot_id: &str,
    ) -> EngineResult<RecordingHandle> {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        {
            let mut slot = self.lock_recording()?;
            if !matches!(*slot, RecordingSlot::Idle) {
                return Err(EngineError::ConflictingOperation(
                    "A recording is already in progress.".to_string(),
                ));
            }
            *slot = RecordingSlot::Acquiring { id };
        }

        let stream = match self.capture.acquire().await {
            Ok(stream) => stream,
            Err(reason) => {
                let mut slot = self.lock_recording()?;
                if matches!(*slot, RecordingSlot::Acquiring { id: current } if current == id) {
                    *slot = RecordingSlot::Idle;
                }
                tracing::warn!("Microphone unavailable for hotspot {}: {}", hotspot_id, reason);
                return Err(EngineError::ResourceUnavailable {
                    hotspot_id: hotspot_id.to_string(),
                    reason,
                });
            }
        };

        let started_at = Utc::now();
        let mut slot = self.lock_recording()?;
        if !matches!(*slot, RecordingSlot::Acquiring { id: current } if current == id) {
            stream.abort();
            return Err(EngineError::InvalidState(
                "Recording was cancelled before the microphone became available.".to_string(),
            ));
        }
        *slot = RecordingSlot::Recording {
            id,
            surface,
            hotspot_id: hotspot_id.to_string(),
            started_at,
            stream,
        };
        RECORDING_ACTIVE.set(1);

        tracing::info!(
            "Recording started: handle={}, surface={}, hotspot={}",
            id,
            surface,
            hotspot_id
        );

        Ok(RecordingHandle {
            id,
            surface,
            hotspot_id: hotspot_id.to_string(),
            started_at,
        })
    }

    pub async fn stop_recording(&self, handle: &RecordingHandle) -> EngineResult<AudioArtifact> {
        let (surface, hotspot_id, started_at, stream) = {
            let mut slot = self.lock_recording()?;
            match std::mem::replace(&mut *slot, RecordingSlot::Idle) {
                RecordingSlot::Recording {
                    id,
                    surface,
                    hotspot_id,
                    started_at,
                    stream,
                } if id == handle.id && surface == handle.surface => {
                    (surface, hotspot_id, started_at, stream)
                }
                other => {
                    *slot = other;
                    return Err(EngineError::InvalidHandle(format!(
                        "Recording handle {} is not active",
                        handle.id
                    )));
                }
            }
        };
        RECORDING_ACTIVE.set(0);

        let captured = stream.finish().await.map_err(|reason| {
            tracing::warn!("Recording for hotspot {} failed: {}", hotspot_id, reason);
            EngineError::ResourceUnavailable {
                hotspot_id: hotspot_id.clone(),
                reason,
            }
        })?;

        if captured.bytes.is_empty() {
            return Err(EngineError::validation("The recording is empty."));
        }

        let name = format!("{}-{}.{}", hotspot_id, handle.id, extension_for(&captured.mime));
        let blob = self.registry.register(captured.bytes, captured.mime, name);
        let duration_ms = (Utc::now() - started_at).num_milliseconds();

        tracing::info!(
            "Recording stopped: handle={}, hotspot={}, bytes={}",
            handle.id,
            hotspot_id,
            blob.len()
        );

        Ok(AudioArtifact {
            surface,
            hotspot_id,
            blob,
            duration_ms,
        })
    }

    /// Aborts any recording and releases the device. Returns whether there
    /// was anything to cancel.
    pub fn cancel_recording(&self) -> bool {
        let previous = match self.recording.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, RecordingSlot::Idle),
            Err(_) => return false,
        };
        match previous {
            RecordingSlot::Idle => false,
            RecordingSlot::Acquiring { id } => {
                tracing::info!("Recording cancelled while acquiring: handle={}", id);
                true
            }
            RecordingSlot::Recording { id, stream, .. } => {
                stream.abort();
                RECORDING_ACTIVE.set(0);
                tracing::info!("Recording cancelled: handle={}", id);
                true
            }
        }
    }

    /// Plays hotspot audio, stopping whatever was playing first. Falls back
    /// to speech synthesis of `fallback_text`.
    pub async fn play(&self, request: PlaybackRequest) -> EngineResult<PlaybackOutcome> {
        let _gate = self.playback_gate.lock().await;
        self.stop();

        if let Some(source) = request.source.clone() {
            let url = source.url().to_string();
            match self.output.start(source).await {
                Ok(sink) => {
                    self.set_current(&request.hotspot_id, sink);
                    MEDIA_PLAYBACK_TOTAL.with_label_values(&[PlaybackPath::Audio.as_str()]).inc();
                    tracing::debug!("Playing audio for hotspot {}: {}", request.hotspot_id, url);
                    return Ok(PlaybackOutcome {
                        hotspot_id: request.hotspot_id,
                        path: PlaybackPath::Audio,
                        url: Some(url),
                        text: None,
                    });
                }
                Err(reason) => {
                    tracing::warn!(
                        "Audio playback failed for hotspot {} ({}), trying speech",
                        request.hotspot_id,
                        reason
                    );
                }
            }
        }

        let text = request
            .fallback_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());

        if let (Some(text), Some(speech)) = (text, self.speech.as_ref()) {
            match speech.speak(text).await {
                Ok(sink) => {
                    self.set_current(&request.hotspot_id, sink);
                    MEDIA_PLAYBACK_TOTAL.with_label_values(&[PlaybackPath::Speech.as_str()]).inc();
                    return Ok(PlaybackOutcome {
                        hotspot_id: request.hotspot_id,
                        path: PlaybackPath::Speech,
                        url: None,
                        text: Some(text.to_string()),
                    });
                }
                Err(reason) => {
                    tracing::warn!("Speech fallback failed for hotspot {}: {}", request.hotspot_id, reason);
                }
            }
        }

        MEDIA_PLAYBACK_TOTAL.with_label_values(&["failed"]).inc();
        Err(EngineError::PlaybackFailed(format!(
            "No playable audio or fallback text for hotspot {}",
            request.hotspot_id
        )))
    }

    /// Stops the current playback, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let active = match self.current.lock() {
            Ok(mut current) => current.take(),
            Err(_) => None,
        };
        if let Some(mut active) = active {
            active.sink.stop();
            tracing::debug!("Playback stopped for hotspot {}", active.hotspot_id);
        }
    }

    /// Synchronous teardown: releases the microphone and silences output.
    pub fn shutdown(&self) {
        self.cancel_recording();
        self.stop();
    }

    fn set_current(&self, hotspot_id: &str, sink: Box<dyn PlaybackSink>) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(ActivePlayback {
                hotspot_id: hotspot_id.to_string(),
                sink,
            });
        }
    }

    fn lock_recording(&self) -> EngineResult<std::sync::MutexGuard<'_, RecordingSlot>> {
        self.recording
            .lock()
            .map_err(|_| EngineError::InvalidState("recording state poisoned".to_string()))
    }
}

impl Drop for MediaManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or_default().trim() {
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mp4" => "m4a",
        _ => "bin",
    }
}

/// Capture device for hosts without a microphone.
pub struct NoCaptureDevice;

#[async_trait]
impl CaptureDevice for NoCaptureDevice {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, String> {
        Err("no capture device is attached to this host".to_string())
    }
}

struct NoopSink;

impl PlaybackSink for NoopSink {
    fn stop(&mut self) {}
}

/// Accepts every source; the client renders it from the returned outcome.
pub struct HeadlessOutput;

#[async_trait]
impl AudioOutput for HeadlessOutput {
    async fn start(&self, source: PlaybackSource) -> Result<Box<dyn PlaybackSink>, String> {
        if source.url().trim().is_empty() {
            return Err("empty audio source".to_string());
        }
        Ok(Box::new(NoopSink))
    }
}

pub struct HeadlessSpeech;

#[async_trait]
impl SpeechSynthesizer for HeadlessSpeech {
    async fn speak(&self, _text: &str) -> Result<Box<dyn PlaybackSink>, String> {
        Ok(Box::new(NoopSink))
    }
}
