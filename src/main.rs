use log::*;
use service::{config::Config, logging::Logger};
use sse::engine::SimulatedEngine;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!("Starting up...");

    let engine = SimulatedEngine::new(
        config.simulated_layers.clone(),
        config.simulated_agents.clone(),
        config.simulated_step_delay(),
    );
    info!(
        "Analysis engine: simulated ({} layers, {} agents, {:?} per step), timeout {:?}",
        config.simulated_layers.len(),
        config.simulated_agents.len(),
        config.simulated_step_delay(),
        config.analysis_timeout()
    );

    let sse_manager = Arc::new(sse::Manager::new(
        Arc::new(engine),
        config.analysis_timeout(),
    ));
    let app_state = web::AppState::new(config, sse_manager);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
