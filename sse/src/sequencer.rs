use crate::registry::RunId;
use events::{AgentComplete, AnalysisEvent, LayerComplete};
use log::*;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// Ordered event emitter for a single run.
///
/// Engines only ever see `&mut Sequencer`; the terminal event is sent by
/// [`Sequencer::finish`], which consumes it.
pub struct Sequencer {
    run_id: RunId,
    sender: UnboundedSender<AnalysisEvent>,
    observer_gone: bool,
    layers_reported: u32,
    agents_reported: u32,
}

impl Sequencer {
    pub(crate) fn new(run_id: RunId, sender: UnboundedSender<AnalysisEvent>) -> Self {
        Self {
            run_id,
            sender,
            observer_gone: false,
            layers_reported: 0,
            agents_reported: 0,
        }
    }

    /// Report a stage transition. Progress above 100 is clamped.
    pub fn stage(&mut self, stage_name: &str, message: &str, progress: u8) {
        self.emit(AnalysisEvent::stage(stage_name, message, progress.min(100)));
    }

    pub fn layer_complete(&mut self, layer: LayerComplete) {
        self.layers_reported += 1;
        self.emit(AnalysisEvent::LayerComplete(layer));
    }

    pub fn agent_complete(&mut self, agent: AgentComplete) {
        self.agents_reported += 1;
        self.emit(AnalysisEvent::AgentComplete(agent));
    }

    /// Whether anyone is still listening. Engines may use this to log, but the
    /// run is not expected to stop when it turns false.
    pub fn observer_connected(&self) -> bool {
        !self.observer_gone && !self.sender.is_closed()
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Send the run's single terminal event.
    pub(crate) fn finish(mut self, outcome: Result<Value, String>) {
        let terminal = match outcome {
            Ok(payload) => AnalysisEvent::Result(payload),
            Err(message) => AnalysisEvent::error(message),
        };

        debug!(
            "Run {} finishing with {} layer(s) and {} agent(s) reported",
            self.run_id, self.layers_reported, self.agents_reported
        );

        self.emit(terminal);
    }

    fn emit(&mut self, event: AnalysisEvent) {
        if self.observer_gone {
            return;
        }

        if self.sender.send(event).is_err() {
            // Logged once; the run carries on without an observer.
            info!(
                "Observer for run {} disconnected, continuing without delivery",
                self.run_id
            );
            self.observer_gone = true;
        }
    }
}
