use axum::response::sse::Event;
use events::AnalysisEvent;
use log::*;

/// Convert a codec event into an axum SSE event with named-event framing.
///
/// Returns `None` if the event body cannot be serialized; the caller skips it.
pub fn to_sse_event(event: &AnalysisEvent) -> Option<Event> {
    match events::encode(event) {
        Ok(frame) => Some(Event::default().event(frame.event).data(frame.data)),
        Err(e) => {
            error!("Failed to serialize analysis event: {e}");
            None
        }
    }
}
