use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Draft persistence
    pub static ref DRAFT_AUTOSAVES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "draft_autosaves_total",
        "Draft autosave attempts",
        &["status"]
    )
    .unwrap();

    pub static ref DRAFT_STORE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "draft_store_duration_seconds",
        "Draft store operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]
    )
    .unwrap();

    // Learner side
    pub static ref HOTSPOT_INTERACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "hotspot_interactions_total",
        "Hotspot interactions recorded",
        &["result"]
    )
    .unwrap();

    pub static ref MEDIA_PLAYBACK_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_playback_total",
        "Hotspot playbacks by path taken",
        &["path"]
    )
    .unwrap();

    pub static ref RECORDING_ACTIVE: IntGauge = register_int_gauge!(
        "recording_active",
        "1 while a capture device is held"
    )
    .unwrap();

    // Publishing
    pub static ref ASSIGNMENTS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assignments_published_total",
        "Publish attempts",
        &["status"]
    )
    .unwrap();

    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Local media uploads performed during publish",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: time a draft store operation
pub async fn track_draft_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;

    DRAFT_STORE_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    result
}
