use crate::engine::{AnalysisEngine, RunRequest};
use crate::registry::{RunId, RunRecord, RunRegistry};
use crate::sequencer::Sequencer;
use events::AnalysisEvent;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Message sent to the observer when the engine exceeds the analysis timeout.
pub const ANALYSIS_TIMED_OUT: &str = "Analysis timed out";

pub struct Manager {
    registry: Arc<RunRegistry>,
    engine: Arc<dyn AnalysisEngine>,
    analysis_timeout: Duration,
}

impl Manager {
    pub fn new(engine: Arc<dyn AnalysisEngine>, analysis_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(RunRegistry::new()),
            engine,
            analysis_timeout,
        }
    }

    /// Start a run on a background task and return the receiving half of its
    /// event stream.
    ///
    /// The stream ends right after the terminal event. Dropping the receiver
    /// detaches the observer; the run itself continues to completion.
    pub fn start_run(&self, request: RunRequest) -> (RunId, UnboundedReceiver<AnalysisEvent>) {
        let run_id = self.registry.register(&request.system_id);
        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            "Starting analysis run {} for system {} ({} agent filter entries)",
            run_id,
            request.system_id,
            request.agents.len()
        );

        let registry = Arc::clone(&self.registry);
        let engine = Arc::clone(&self.engine);
        let timeout = self.analysis_timeout;
        let task_run_id = run_id.clone();

        tokio::spawn(async move {
            let mut sequencer = Sequencer::new(task_run_id.clone(), tx);

            let outcome =
                match tokio::time::timeout(timeout, engine.run(&request, &mut sequencer)).await {
                    Ok(Ok(payload)) => Ok(payload),
                    Ok(Err(e)) => {
                        warn!("Analysis run {task_run_id} failed: {e}");
                        Err(e.to_string())
                    }
                    Err(_) => {
                        warn!("Analysis run {task_run_id} exceeded {timeout:?}");
                        Err(ANALYSIS_TIMED_OUT.to_string())
                    }
                };

            registry.finish(&request.system_id, &task_run_id, &outcome);
            sequencer.finish(outcome);

            info!("Analysis run {task_run_id} finished");
        });

        (run_id, rx)
    }

    /// Latest run recorded for a system, if any.
    pub fn run_status(&self, system_id: &str) -> Option<RunRecord> {
        self.registry.get(system_id)
    }

    pub fn running_count(&self) -> usize {
        self.registry.running_count()
    }
}
