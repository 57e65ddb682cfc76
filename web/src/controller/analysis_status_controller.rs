use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::{AppState, Error};
use log::*;

/// GET the status of the most recent analysis run for a system.
///
/// Clients that lost their analysis stream use this to find out whether the
/// run is still executing or how it ended.
#[utoipa::path(
    get,
    path = "/systems/{system_id}/analysis-status",
    params(
        ("system_id" = String, Path, description = "System whose latest run to look up"),
    ),
    responses(
        (status = 200, description = "Run record with status running, completed or failed"),
        (status = 404, description = "No analysis has been started for this system"),
    )
)]
pub async fn read(
    State(app_state): State<AppState>,
    Path(system_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET analysis status for system {system_id}");

    let record = app_state
        .sse_manager
        .run_status(&system_id)
        .ok_or_else(|| Error::not_found(format!("analysis run for system {system_id}")))?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), record)))
}
