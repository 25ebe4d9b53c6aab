use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use services::AppState;

/// Worksheet scans and recordings are posted as raw bodies.
const MEDIA_BODY_LIMIT: usize = 25 * 1024 * 1024;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static(handlers::authoring::FILE_NAME_HEADER),
            header::HeaderName::from_static(middlewares::trace::TRACE_ID_HEADER),
        ])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1/surfaces/{surface}", surface_routes())
        .nest("/api/v1/templates", template_routes())
        .nest("/api/v1/assignments", viewer_routes())
        .route("/api/v1/playback", delete(handlers::viewer::stop_playback))
        .route("/api/v1/progress/stream", get(handlers::sse::progress_stream))
        .route("/api/v1/roster/classes", get(handlers::authoring::list_classes))
        .route("/api/v1/roster/students", get(handlers::authoring::list_students))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn surface_routes() -> Router<Arc<AppState>> {
    let media = Router::new()
        .route("/image", post(handlers::authoring::attach_image))
        .route(
            "/hotspots/{hotspot_id}/audio",
            post(handlers::authoring::attach_audio),
        )
        .layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT));

    Router::new()
        .route("/session", get(handlers::authoring::get_session))
        .route("/session/restore", post(handlers::authoring::restore_session))
        .route("/details", put(handlers::authoring::update_details))
        .route("/commands", post(handlers::authoring::dispatch_command))
        .route(
            "/hotspots/{hotspot_id}/recording",
            post(handlers::authoring::start_recording),
        )
        .route("/recording/stop", post(handlers::authoring::stop_recording))
        .route("/recording", delete(handlers::authoring::cancel_recording))
        .route("/publish", post(handlers::authoring::publish))
        .route("/draft", delete(handlers::authoring::discard_draft))
        .merge(media)
}

fn template_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(handlers::templates::list_templates).post(handlers::templates::save_template),
        )
        .route("/{id}/apply", post(handlers::templates::apply_template))
        .route("/{id}", delete(handlers::templates::delete_template))
}

fn viewer_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::viewer::list_assignments))
        .route(
            "/{id}/hotspots/{hotspot_id}/interactions",
            post(handlers::viewer::record_interaction),
        )
        .route("/{id}/progress", get(handlers::viewer::get_progress))
}
