use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{models::progress::ProgressEvent, services::AppState};

/// SSE endpoint for learner progress events
/// GET /api/v1/progress/stream
pub async fn progress_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracker = state.viewer.tracker();
    tracing::info!(
        "Client connected to progress stream: learner={}",
        tracker.learner_id()
    );

    Sse::new(create_progress_stream(tracker.subscribe())).keep_alive(KeepAlive::default())
}

/// One SSE event per broadcast progress event. Lagging subscribers skip
/// what they missed; the stream ends when the tracker goes away.
fn create_progress_stream(
    receiver: broadcast::Receiver<ProgressEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(progress) => {
                    let event = Event::default()
                        .event(progress.event_name())
                        .data(progress.to_sse_data());
                    return Some((Ok(event), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Progress stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
