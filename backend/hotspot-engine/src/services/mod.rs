use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::models::draft::AuthoringSurface;
use crate::utils::retry::RetryConfig;

use api_client::{AssignmentApi, HttpAssignmentApi};
use authoring_service::AuthoringWorkspace;
use autosave::Autosaver;
use blob_registry::BlobRegistry;
use draft_codec::DraftCodec;
use draft_store::{DraftStore, MemoryDraftStore, RedisDraftStore};
use media_service::MediaManager;
use progress_service::ProgressTracker;
use publish_service::PublishService;
use template_library::TemplateLibrary;
use viewer_service::ViewerService;

pub struct AppState {
    pub config: Config,
    pub registry: BlobRegistry,
    pub codec: DraftCodec,
    pub store: Arc<dyn DraftStore>,
    pub api: Arc<dyn AssignmentApi>,
    pub media: Arc<MediaManager>,
    pub templates: TemplateLibrary,
    pub publisher: PublishService,
    pub viewer: ViewerService,
    workspaces: [Arc<AuthoringWorkspace>; 3],
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let api: Arc<dyn AssignmentApi> = Arc::new(
            HttpAssignmentApi::new(&config.api_base_url, config.api_timeout())?.with_retry(
                RetryConfig {
                    max_attempts: config.api_retry_attempts,
                    ..RetryConfig::default()
                },
            ),
        );
        tracing::info!("Assignments API: {}", config.api_base_url);

        let store: Arc<dyn DraftStore> = match config.redis_uri.clone() {
            Some(uri) => Arc::new(RedisDraftStore::new(
                connect_redis(&uri).await?,
                config.drafts.ttl_seconds,
            )),
            None => Arc::new(MemoryDraftStore::new()),
        };

        let registry = BlobRegistry::new();
        let media = MediaManager::headless(registry.clone());
        Ok(Self::with_components(config, api, store, registry, media))
    }

    /// Wires the engine around already-built collaborators.
    pub fn with_components(
        config: Config,
        api: Arc<dyn AssignmentApi>,
        store: Arc<dyn DraftStore>,
        registry: BlobRegistry,
        media: MediaManager,
    ) -> Self {
        let codec = DraftCodec::new(registry.clone());
        let media = Arc::new(media);

        let workspaces = AuthoringSurface::ALL.map(|surface| {
            let autosaver = Autosaver::new(
                store.clone(),
                codec.clone(),
                surface.draft_key(&config.drafts.key_prefix),
                config.drafts.debounce(),
            );
            Arc::new(AuthoringWorkspace::new(surface, config.editor.clone(), autosaver))
        });

        let templates = TemplateLibrary::new(
            api.clone(),
            store.clone(),
            codec.clone(),
            &config.drafts.key_prefix,
        );
        let publisher = PublishService::new(api.clone());
        let tracker = Arc::new(ProgressTracker::new(config.learner.id.clone()));
        let viewer = ViewerService::new(api.clone(), tracker, media.clone(), config.learner.clone());

        tracing::info!("Draft store backend: {}", store.backend());

        Self {
            config,
            registry,
            codec,
            store,
            api,
            media,
            templates,
            publisher,
            viewer,
            workspaces,
        }
    }

    pub fn workspace(&self, surface: AuthoringSurface) -> Arc<AuthoringWorkspace> {
        let index = match surface {
            AuthoringSurface::TeacherAuthoring => 0,
            AuthoringSurface::AssignmentSystem => 1,
            AuthoringSurface::Qaidah => 2,
        };
        self.workspaces[index].clone()
    }

    /// Flushes every non-empty draft and releases media devices.
    pub async fn shutdown(&self) {
        self.media.shutdown();
        for workspace in &self.workspaces {
            if workspace.flush().await {
                tracing::info!("Draft flushed on shutdown: {}", workspace.surface());
            }
        }
    }
}

async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(uri)?;

    tracing::info!("Attempting to connect to Redis...");

    let redis = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        ConnectionManager::new(client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod api_client;
pub mod authoring_service;
pub mod autosave;
pub mod blob_registry;
pub mod canvas_editor;
pub mod draft_codec;
pub mod draft_store;
pub mod media_service;
pub mod progress_service;
pub mod publish_service;
pub mod template_library;
pub mod viewer_service;
