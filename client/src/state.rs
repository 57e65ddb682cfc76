//! Accumulated view of one observed analysis run.

use crate::transport::Delivery;
use events::{AgentComplete, AnalysisEvent, LayerComplete, DECODE_FAILURE_MESSAGE};
use serde::Serialize;
use serde_json::Value;

pub const CONNECTING_MESSAGE: &str = "Connecting...";
pub const ANALYSIS_COMPLETE_MESSAGE: &str = "Analysis complete";
pub const CANCELLED_MESSAGE: &str = "Cancelled";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost — the analysis may still be running on the server. Refresh the page to check for results.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Errored,
    Cancelled,
}

/// Why an errored session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A frame could not be decoded.
    Decode,
    /// The connection failed or went idle before a terminal event. The run
    /// may still be executing.
    ConnectionLost,
    /// The producer sent an `error` event.
    Server,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamState {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub active: bool,
    pub progress: u8,
    pub message: String,
    pub layers: Vec<LayerComplete>,
    pub agents: Vec<AgentComplete>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            session_id: None,
            status: SessionStatus::Pending,
            active: false,
            progress: 0,
            message: String::new(),
            layers: Vec::new(),
            agents: Vec::new(),
            result: None,
            error: None,
            error_kind: None,
        }
    }
}

impl StreamState {
    /// Fresh state for a session whose channel is being opened.
    pub fn connecting(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            status: SessionStatus::Active,
            active: true,
            message: CONNECTING_MESSAGE.to_string(),
            ..Self::default()
        }
    }

    /// Observer detached by the caller.
    ///
    /// Always ends inactive with the cancelled message. A session that had
    /// already reached a terminal status keeps that status and its
    /// result or error.
    pub fn cancelled(mut self) -> Self {
        if self.active {
            self.status = SessionStatus::Cancelled;
        }
        self.active = false;
        self.message = CANCELLED_MESSAGE.to_string();
        self
    }

    /// The channel could not be opened at all.
    pub fn failed_to_open(mut self, reason: String) -> Self {
        if !self.active {
            return self;
        }
        self.active = false;
        self.status = SessionStatus::Errored;
        self.error = Some(reason);
        self.error_kind = Some(FailureKind::ConnectionLost);
        self
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Errored | SessionStatus::Cancelled
        )
    }

    fn fail(mut self, message: String, kind: FailureKind) -> Self {
        self.active = false;
        self.status = SessionStatus::Errored;
        self.error = Some(message);
        self.error_kind = Some(kind);
        self
    }
}

/// Apply one delivery to the previous state.
///
/// Once the state is inactive every delivery is ignored.
pub fn reduce(mut state: StreamState, delivery: &Delivery) -> StreamState {
    if !state.active {
        return state;
    }

    match delivery {
        Delivery::Event(AnalysisEvent::Stage(stage)) => {
            state.progress = stage.progress;
            state.message = stage.message.clone();
            state
        }
        Delivery::Event(AnalysisEvent::LayerComplete(layer)) => {
            state.layers.push(layer.clone());
            state
        }
        Delivery::Event(AnalysisEvent::AgentComplete(agent)) => {
            state.agents.push(agent.clone());
            state
        }
        Delivery::Event(AnalysisEvent::Result(payload)) => {
            state.active = false;
            state.status = SessionStatus::Completed;
            state.progress = 100;
            state.message = ANALYSIS_COMPLETE_MESSAGE.to_string();
            state.result = Some(payload.clone());
            state
        }
        Delivery::Event(AnalysisEvent::Error(failure)) => {
            state.fail(failure.message.clone(), FailureKind::Server)
        }
        Delivery::Malformed(_) => state.fail(DECODE_FAILURE_MESSAGE.to_string(), FailureKind::Decode),
        Delivery::ConnectionLost(_) => {
            state.fail(CONNECTION_LOST_MESSAGE.to_string(), FailureKind::ConnectionLost)
        }
    }
}
