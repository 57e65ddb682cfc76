use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

// Systems are identified by the opaque id taken from the request path
pub type SystemId = String;

/// Unique identifier for one analysis run (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// What is known about the most recent run for a system.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub system_id: SystemId,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Latest run per system.
///
/// Runs are never cancelled, so several runs for one system may be executing
/// at once; only the newest one is tracked and older runs finishing late never
/// overwrite it.
pub struct RunRegistry {
    runs: DashMap<SystemId, RunRecord>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
        }
    }

    /// Record a new running run for `system_id`, replacing any previous record.
    pub fn register(&self, system_id: &str) -> RunId {
        let run_id = RunId::new();

        let previous = self.runs.insert(
            system_id.to_string(),
            RunRecord {
                run_id: run_id.clone(),
                system_id: system_id.to_string(),
                status: RunStatus::Running,
                message: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );

        if let Some(previous) = previous {
            if previous.status == RunStatus::Running {
                warn!(
                    "Run {} for system {} superseded by run {} while still running",
                    previous.run_id, system_id, run_id
                );
            }
        }

        run_id
    }

    /// Record how a run ended. Returns `false` if the run was superseded.
    pub fn finish(&self, system_id: &str, run_id: &RunId, outcome: &Result<Value, String>) -> bool {
        let Some(mut record) = self.runs.get_mut(system_id) else {
            return false;
        };

        if &record.run_id != run_id {
            debug!("Ignoring outcome of superseded run {run_id} for system {system_id}");
            return false;
        }

        let (status, message) = match outcome {
            Ok(_) => (RunStatus::Completed, None),
            Err(message) => (RunStatus::Failed, Some(message.clone())),
        };
        record.status = status;
        record.message = message;
        record.finished_at = Some(Utc::now());

        true
    }

    pub fn get(&self, system_id: &str) -> Option<RunRecord> {
        self.runs.get(system_id).map(|entry| entry.value().clone())
    }

    pub fn running_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|entry| entry.value().status == RunStatus::Running)
            .count()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}
