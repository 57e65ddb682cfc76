//! Wire codec for analysis progress events.
//!
//! This crate defines the five event variants a producer emits while an
//! analysis run is executing, and the textual framing they travel in.
//!
//! # Architecture
//!
//! - **AnalysisEvent**: tagged union of `stage`, `layer_complete`,
//!   `agent_complete`, `result` and `error` events
//! - **Frame**: one named-event block (`event: <name>` / `data: <json>` lines,
//!   terminated by a blank line)
//! - **encode / decode**: conversion between the two. Decoding never panics
//!   and never throws; malformed input comes back as a [`DecodeError`] that
//!   carries the raw frame.
//!
//! This crate has no dependencies on other workspace crates. Both the
//! reference producer (`sse`) and the consumer (`analysis-client`) build on it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Message surfaced to the observer when a frame cannot be decoded.
pub const DECODE_FAILURE_MESSAGE: &str = "Connection lost";

/// Name used by the event-stream format when a block carries no `event:` line.
const DEFAULT_EVENT_NAME: &str = "message";

/// Trait for getting the wire event name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Coarse-grained progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "stage")]
    pub stage_name: String,
    pub message: String,
    /// Completion percentage, 0 through 100.
    pub progress: u8,
}

/// One deterministic detection pass finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerComplete {
    #[serde(rename = "layer")]
    pub layer_name: String,
    pub layer_index: u32,
    pub total_layers: u32,
    #[serde(rename = "anomaly_count")]
    pub finding_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Error,
}

/// One independent analysis agent finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentComplete {
    #[serde(rename = "agent")]
    pub agent_name: String,
    pub status: AgentStatus,
    #[serde(rename = "findings")]
    pub finding_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<String>,
}

/// Body of a producer-sent `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
}

/// Every event a producer can put on the wire for one run.
///
/// `Result` and `Error` are terminal: a well-formed run ends with exactly one
/// of them and nothing after it.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Stage(Stage),
    LayerComplete(LayerComplete),
    AgentComplete(AgentComplete),
    /// Opaque analysis-result document.
    Result(Value),
    Error(Failure),
}

impl AnalysisEvent {
    pub fn stage(stage_name: impl Into<String>, message: impl Into<String>, progress: u8) -> Self {
        AnalysisEvent::Stage(Stage {
            stage_name: stage_name.into(),
            message: message.into(),
            progress,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        AnalysisEvent::Error(Failure {
            message: message.into(),
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisEvent::Result(_) | AnalysisEvent::Error(_))
    }
}

impl EventType for AnalysisEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AnalysisEvent::Stage(_) => "stage",
            AnalysisEvent::LayerComplete(_) => "layer_complete",
            AnalysisEvent::AgentComplete(_) => "agent_complete",
            AnalysisEvent::Result(_) => "result",
            AnalysisEvent::Error(_) => "error",
        }
    }
}

/// One named-event block as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Render the frame in event-stream framing, blank-line terminated.
    pub fn to_text(&self) -> String {
        let mut text = format!("event: {}\n", self.event);
        for line in self.data.split('\n') {
            text.push_str("data: ");
            text.push_str(line);
            text.push('\n');
        }
        text.push('\n');
        text
    }

    /// Parse a single block (without its terminating blank line).
    ///
    /// Returns `None` for blocks that carry no data, such as keep-alive
    /// comments.
    pub fn parse(block: &str) -> Option<Frame> {
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => event = Some(value),
                "data" => data.push(value),
                // id and retry are not part of this protocol
                _ => {}
            }
        }

        if data.is_empty() {
            return None;
        }

        Some(Frame {
            event: event.unwrap_or(DEFAULT_EVENT_NAME).to_string(),
            data: data.join("\n"),
        })
    }
}

/// Split a complete event-stream body into frames, skipping comment blocks.
pub fn parse_stream(body: &str) -> Vec<Frame> {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .filter_map(Frame::parse)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The event name is not one of the five known variants.
    UnknownEvent,
    /// The data line is not valid JSON for the named variant.
    MalformedBody(String),
    /// A stage reported progress above 100.
    ProgressOutOfRange(u8),
}

/// A frame that could not be turned into an [`AnalysisEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub frame: Frame,
    pub error_kind: DecodeErrorKind,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_kind {
            DecodeErrorKind::UnknownEvent => {
                write!(f, "Unknown event type: {}", self.frame.event)
            }
            DecodeErrorKind::MalformedBody(reason) => {
                write!(f, "Malformed {} body: {}", self.frame.event, reason)
            }
            DecodeErrorKind::ProgressOutOfRange(progress) => {
                write!(f, "Stage progress out of range: {progress}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode an event into its wire frame.
pub fn encode(event: &AnalysisEvent) -> serde_json::Result<Frame> {
    let data = match event {
        AnalysisEvent::Stage(stage) => serde_json::to_string(stage)?,
        AnalysisEvent::LayerComplete(layer) => serde_json::to_string(layer)?,
        AnalysisEvent::AgentComplete(agent) => serde_json::to_string(agent)?,
        AnalysisEvent::Result(payload) => serde_json::to_string(payload)?,
        AnalysisEvent::Error(failure) => serde_json::to_string(failure)?,
    };

    Ok(Frame::new(event.event_type(), data))
}

/// Decode one wire frame into exactly one event variant.
pub fn decode(frame: &Frame) -> Result<AnalysisEvent, DecodeError> {
    match frame.event.as_str() {
        "stage" => {
            let stage: Stage = body(frame)?;
            if stage.progress > 100 {
                return Err(DecodeError {
                    frame: frame.clone(),
                    error_kind: DecodeErrorKind::ProgressOutOfRange(stage.progress),
                });
            }
            Ok(AnalysisEvent::Stage(stage))
        }
        "layer_complete" => Ok(AnalysisEvent::LayerComplete(body(frame)?)),
        "agent_complete" => Ok(AnalysisEvent::AgentComplete(body(frame)?)),
        "result" => Ok(AnalysisEvent::Result(body(frame)?)),
        "error" => Ok(AnalysisEvent::Error(body(frame)?)),
        _ => Err(DecodeError {
            frame: frame.clone(),
            error_kind: DecodeErrorKind::UnknownEvent,
        }),
    }
}

/// Decode a frame, replacing anything undecodable with an `error` event
/// carrying [`DECODE_FAILURE_MESSAGE`].
pub fn decode_or_fallback(frame: &Frame) -> AnalysisEvent {
    decode(frame).unwrap_or_else(|_| AnalysisEvent::error(DECODE_FAILURE_MESSAGE))
}

fn body<T: DeserializeOwned>(frame: &Frame) -> Result<T, DecodeError> {
    serde_json::from_str(&frame.data).map_err(|e| DecodeError {
        frame: frame.clone(),
        error_kind: DecodeErrorKind::MalformedBody(e.to_string()),
    })
}
