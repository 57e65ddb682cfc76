use crate::params::analysis::StreamParams;
use crate::AppState;
use async_stream::stream;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use ::sse::engine::RunRequest;
use ::sse::message::to_sse_event;
use std::convert::Infallible;

/// GET stream the progress of a new analysis run for a system.
///
/// Every request starts a fresh run observed by this connection alone. The
/// stream ends right after the `result` or `error` event. Closing the
/// connection early detaches the observer; the run itself keeps going.
#[utoipa::path(
    get,
    path = "/systems/{system_id}/analyze-stream",
    params(
        ("system_id" = String, Path, description = "System to analyze"),
        StreamParams,
    ),
    responses(
        (status = 200, description = "text/event-stream of named events: stage, layer_complete, agent_complete, result, error"),
    )
)]
pub(crate) async fn analyze_stream(
    Path(system_id): Path<String>,
    Query(params): Query<StreamParams>,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing analysis stream for system {system_id}");

    let (run_id, mut rx) = app_state.sse_manager.start_run(RunRequest {
        system_id,
        agents: params.agent_filter(),
    });

    // The channel closes once the run has sent its terminal event
    let stream = stream! {
        while let Some(event) = rx.recv().await {
            if let Some(sse_event) = to_sse_event(&event) {
                yield Ok(sse_event);
            }
        }

        debug!("Analysis stream for run {run_id} closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
