#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use hotspot_engine::{
    config::{Config, LearnerSettings},
    create_router,
    error::{EngineError, EngineResult},
    models::{
        template::{Template, TemplateOrigin},
        Assignment, AssignmentMode, AssignmentStatus, Hotspot, HotspotObjective, MediaRef,
        NewAssignment, Recipients, RosterEntry,
    },
    services::{
        api_client::AssignmentApi,
        blob_registry::BlobRegistry,
        draft_store::{DraftStore, MemoryDraftStore},
        media_service::{
            CaptureDevice, CaptureStream, CapturedAudio, HeadlessOutput, HeadlessSpeech,
            MediaManager,
        },
        AppState,
    },
};

pub const LEARNER_ID: &str = "amina";
pub const LEARNER_CLASS: &str = "class-7b";
pub const TEST_DEBOUNCE_MS: u64 = 20;

/// In-memory stand-in for the remote assignment service.
#[derive(Default)]
pub struct FakeAssignmentApi {
    pub assignments: Mutex<Vec<Assignment>>,
    pub templates: Mutex<Vec<Template>>,
    pub uploads: Mutex<Vec<(String, String, usize)>>,
    pub fail_create: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_catalog: AtomicBool,
    /// Holds every create call this long, to keep a publish in flight.
    pub create_delay_ms: AtomicU64,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
}

impl FakeAssignmentApi {
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn seed_assignment(&self, assignment: Assignment) {
        self.assignments.lock().unwrap().push(assignment);
    }

    pub fn seed_template(&self, template: Template) {
        self.templates.lock().unwrap().push(template);
    }

    pub fn created(&self) -> Vec<Assignment> {
        self.assignments.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssignmentApi for FakeAssignmentApi {
    async fn list_assignments(&self) -> EngineResult<Vec<Assignment>> {
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(EngineError::network("catalog unavailable", true));
        }
        Ok(self.assignments.lock().unwrap().clone())
    }

    async fn create_assignment(&self, request: &NewAssignment) -> EngineResult<Assignment> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(EngineError::network("connection reset by peer", true));
        }

        let created = Assignment {
            id: format!("assignment-{}", call),
            title: request.title.clone(),
            description: request.description.clone(),
            due_at: request.due_at,
            notes: request.notes.clone(),
            image: Some(MediaRef::remote(request.image_url.clone())),
            mode: request.mode,
            recipients: request.recipients.clone(),
            hotspots: request.hotspots.clone(),
            status: request.status,
            created_at: Utc::now(),
            created_by: request.created_by.clone(),
        };
        self.assignments.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn upload(&self, bytes: Vec<u8>, file_name: &str, mime: &str) -> EngineResult<String> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(EngineError::network("upload rejected", false));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), mime.to_string(), bytes.len()));
        Ok(format!("/uploads/{}-{}", call, file_name))
    }

    async fn list_templates(&self) -> EngineResult<Vec<Template>> {
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(EngineError::network("catalog unavailable", true));
        }
        Ok(self.templates.lock().unwrap().clone())
    }

    async fn list_classes(&self) -> EngineResult<Vec<RosterEntry>> {
        Ok(vec![RosterEntry {
            id: LEARNER_CLASS.to_string(),
            name: "Class 7B".to_string(),
        }])
    }

    async fn list_students(&self) -> EngineResult<Vec<RosterEntry>> {
        Ok(vec![RosterEntry {
            id: LEARNER_ID.to_string(),
            name: "Amina".to_string(),
        }])
    }
}

/// Microphone that always yields a short webm clip.
pub struct FakeMicrophone;

struct FakeCapture;

#[async_trait]
impl CaptureDevice for FakeMicrophone {
    async fn acquire(&self) -> Result<Box<dyn CaptureStream>, String> {
        Ok(Box::new(FakeCapture))
    }
}

#[async_trait]
impl CaptureStream for FakeCapture {
    async fn finish(self: Box<Self>) -> Result<CapturedAudio, String> {
        Ok(CapturedAudio {
            bytes: vec![0x1a, 0x45, 0xdf, 0xa3, 0x01],
            mime: "audio/webm".to_string(),
        })
    }

    fn abort(self: Box<Self>) {}
}

/// Memory store that can be switched into an outage; every call then
/// fails with a persistence error.
pub struct FlakyStore {
    inner: MemoryDraftStore,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryDraftStore) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> EngineResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence("store down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStore for FlakyStore {
    async fn load(&self, key: &str) -> EngineResult<Option<String>> {
        self.check()?;
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> EngineResult<()> {
        self.check()?;
        self.inner.save(key, value).await
    }

    async fn clear(&self, key: &str) -> EngineResult<()> {
        self.check()?;
        self.inner.clear(key).await
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    async fn ping(&self) -> EngineResult<()> {
        self.check()
    }
}

pub struct TestContext {
    pub app: Router,
    pub state: Arc<AppState>,
    pub api: Arc<FakeAssignmentApi>,
    pub store: MemoryDraftStore,
    pub flaky: Arc<FlakyStore>,
}

impl TestContext {
    pub fn store_down(&self, down: bool) {
        self.flaky.set_down(down);
    }
}

pub fn test_config() -> Config {
    let mut config = Config::for_api("http://assignments.test/api");
    config.drafts.autosave_debounce_ms = TEST_DEBOUNCE_MS;
    config.learner = LearnerSettings {
        id: LEARNER_ID.to_string(),
        classes: vec![LEARNER_CLASS.to_string()],
    };
    config
}

/// Builds the engine around fakes. `microphone` plugs in a working capture
/// device; otherwise recording is unavailable like in the service binary.
pub fn create_test_context_with(store: MemoryDraftStore, microphone: bool) -> TestContext {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let api = Arc::new(FakeAssignmentApi::default());
    let registry = BlobRegistry::new();
    let media = if microphone {
        MediaManager::new(
            Arc::new(FakeMicrophone),
            Arc::new(HeadlessOutput),
            Some(Arc::new(HeadlessSpeech)),
            registry.clone(),
        )
    } else {
        MediaManager::headless(registry.clone())
    };

    let flaky = Arc::new(FlakyStore::new(store.clone()));
    let state = Arc::new(AppState::with_components(
        test_config(),
        api.clone(),
        flaky.clone(),
        registry,
        media,
    ));

    TestContext {
        app: create_router(state.clone()),
        state,
        api,
        store,
        flaky,
    }
}

pub fn create_test_context() -> TestContext {
    create_test_context_with(MemoryDraftStore::new(), false)
}

pub fn create_test_app() -> Router {
    create_test_context().app
}

/// Waits long enough for any scheduled autosave to land.
pub async fn settle_autosave() {
    tokio::time::sleep(std::time::Duration::from_millis(TEST_DEBOUNCE_MS * 5)).await;
}

pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn send_bytes(
    app: &Router,
    uri: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(bytes))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub fn remote_hotspot(id: &str, order: u32, x: f64, y: f64) -> Hotspot {
    Hotspot {
        id: id.to_string(),
        order,
        x,
        y,
        width: 0.1,
        height: 0.1,
        instruction: format!("Hotspot {}", order),
        objective: HotspotObjective::ArticulationPoint,
        description: None,
        text_fallback: Some(format!("Letter {}", order)),
        transliteration: None,
        icon: None,
        audio: Some(MediaRef::remote(format!("/uploads/{}.webm", id))),
    }
}

pub fn sample_assignment(id: &str, recipients: Recipients, hotspot_count: u32) -> Assignment {
    Assignment {
        id: id.to_string(),
        title: format!("Worksheet {}", id),
        description: "Tap each letter and repeat after the recording.".to_string(),
        due_at: None,
        notes: String::new(),
        image: Some(MediaRef::remote(format!("/uploads/{}.png", id))),
        mode: AssignmentMode::Hotspot,
        recipients,
        hotspots: (1..=hotspot_count)
            .map(|order| {
                remote_hotspot(
                    &format!("{}-h{}", id, order),
                    order,
                    0.1 * order as f64,
                    0.2,
                )
            })
            .collect(),
        status: AssignmentStatus::Assigned,
        created_at: Utc::now(),
        created_by: "Ustadha Maryam".to_string(),
    }
}

pub fn sample_template(id: &str) -> Template {
    Template {
        id: id.to_string(),
        name: "Al-Fatiha page".to_string(),
        image: MediaRef::remote("/templates/fatiha.png"),
        hotspots: vec![remote_hotspot("t-h1", 1, 0.3, 0.3), remote_hotspot("t-h2", 2, 0.6, 0.3)],
        origin: TemplateOrigin::Api,
    }
}
