//! The seam between the stream and the analysis engine that does the work.

use crate::sequencer::Sequencer;
use async_trait::async_trait;
use events::{AgentComplete, AgentStatus, LayerComplete};
use log::*;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Parameters of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub system_id: String,
    /// Agents to dispatch. Empty means every agent the engine knows.
    pub agents: Vec<String>,
}

#[derive(Debug)]
pub enum EngineError {
    /// The engine has no data for the requested system.
    SystemNotFound(String),
    /// The engine gave up; the message is shown to the observer verbatim.
    Failed(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SystemNotFound(system_id) => write!(f, "System not found: {system_id}"),
            EngineError::Failed(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Something that analyses a system and reports progress while doing so.
///
/// Implementations emit stages, layer and agent completions through the
/// sequencer and return the result document. The terminal event is sent by
/// the caller from the returned value.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn run(
        &self,
        request: &RunRequest,
        sequencer: &mut Sequencer,
    ) -> Result<Value, EngineError>;
}

/// Engine that walks a fixed list of layers and agents with deterministic
/// finding counts. Used when no real engine is wired in, and in tests.
pub struct SimulatedEngine {
    layers: Vec<String>,
    agents: Vec<String>,
    step_delay: Duration,
}

impl SimulatedEngine {
    pub fn new(layers: Vec<String>, agents: Vec<String>, step_delay: Duration) -> Self {
        Self {
            layers,
            agents,
            step_delay,
        }
    }

    /// Resolve the agent filter against the known agents, preserving the
    /// engine's order.
    fn select_agents(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            return self.agents.clone();
        }

        for name in requested {
            if !self.agents.contains(name) {
                warn!("Ignoring unknown agent in filter: {name}");
            }
        }

        self.agents
            .iter()
            .filter(|agent| requested.contains(agent))
            .cloned()
            .collect()
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }
}

/// Stable pseudo-random count derived from the system and unit names.
fn finding_count(system_id: &str, unit: &str, modulus: u32) -> u32 {
    let sum = system_id
        .bytes()
        .chain(unit.bytes())
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    sum % modulus
}

#[async_trait]
impl AnalysisEngine for SimulatedEngine {
    async fn run(
        &self,
        request: &RunRequest,
        sequencer: &mut Sequencer,
    ) -> Result<Value, EngineError> {
        let agents = self.select_agents(&request.agents);
        let total_layers = self.layers.len() as u32;

        sequencer.stage("loading", "Loading system data", 5);
        self.pause().await;

        sequencer.stage("layers", "Running detection layers", 10);
        let mut total_findings = 0u32;
        let mut layer_summaries = Vec::with_capacity(self.layers.len());
        for (index, layer_name) in self.layers.iter().enumerate() {
            self.pause().await;
            let count = finding_count(&request.system_id, layer_name, 5);
            total_findings += count;
            sequencer.layer_complete(LayerComplete {
                layer_name: layer_name.clone(),
                layer_index: index as u32,
                total_layers,
                finding_count: count,
            });
            layer_summaries.push(json!({"layer": layer_name, "anomaly_count": count}));
        }

        sequencer.stage(
            "agents",
            &format!("Dispatching {} agent(s)", agents.len()),
            50,
        );
        let mut agent_summaries = Vec::with_capacity(agents.len());
        for agent_name in &agents {
            self.pause().await;
            let count = finding_count(&request.system_id, agent_name, 4);
            total_findings += count;
            sequencer.agent_complete(AgentComplete {
                agent_name: agent_name.clone(),
                status: AgentStatus::Success,
                finding_count: count,
                perspective: None,
            });
            agent_summaries.push(json!({"agent": agent_name, "findings": count}));
        }

        sequencer.stage("report", "Compiling results", 95);
        self.pause().await;

        let health_score = (100.0 - f64::from(total_findings) * 1.5).max(0.0);

        Ok(json!({
            "system_id": request.system_id,
            "health_score": health_score,
            "total_findings": total_findings,
            "layers": layer_summaries,
            "agents": agent_summaries,
        }))
    }
}
