//! HTTP surface of the analysis progress stream.
//!
//! Exposes one server-push stream per analysis run plus a status lookup for
//! clients that lost their stream, on top of the `sse` crate's run manager.

use axum::http::{HeaderValue, Method};
use log::*;
use service::config::Config;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
mod params;
mod router;
mod sse;


pub use error::{Error, Result};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<::sse::Manager>,
}

impl AppState {
    pub fn new(config: Config, sse_manager: Arc<::sse::Manager>) -> Self {
        Self {
            config,
            sse_manager,
        }
    }
}

/// Build the complete application router, CORS included.
pub fn app(app_state: AppState) -> axum::Router {
    let allowed_origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(allowed_origins);

    router::define_routes(app_state).layer(cors_layer)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_address = app_state.config.listen_address();
    info!(
        "Server starting... listening for connections on http://{listen_address} ({} environment)",
        app_state.config.runtime_env()
    );

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    axum::serve(listener, app(app_state)).await
}
