use crate::{
    controller::{analysis_status_controller, health_check_controller},
    sse::handler as sse_handler,
    AppState,
};
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path must be listed here.
#[derive(OpenApi)]
#[openapi(
    info(title = "Analysis Stream API"),
    paths(
        analysis_status_controller::read,
        health_check_controller::health_check,
        sse_handler::analyze_stream,
    )
)]
pub struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(analysis_routes(app_state))
        .merge(health_routes())
        .merge(api_doc_routes())
}

fn analysis_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/systems/:system_id/analyze-stream",
            get(sse_handler::analyze_stream),
        )
        .route(
            "/systems/:system_id/analysis-status",
            get(analysis_status_controller::read),
        )
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn api_doc_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
