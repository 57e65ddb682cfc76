//! Producer side of the analysis progress stream.
//!
//! This crate runs an analysis engine for one system and turns what it reports
//! into the ordered event sequence the `events` codec defines. It is the
//! reference producer the web layer serves over `GET
//! /systems/{id}/analyze-stream`.
//!
//! # Architecture
//!
//! - **One stream per run**: every request starts a fresh run whose events go
//!   to exactly one observer. There is no fan-out and no replay.
//! - **Sequencer**: the only way an engine can emit events. It owns the
//!   sending half of the run's channel and is consumed when the terminal
//!   event is sent, so a run can never emit two outcomes or anything after
//!   its outcome.
//! - **Runs outlive observers**: if the observer disconnects the engine keeps
//!   going and the registry still records how the run ended. Nothing tells
//!   the engine to stop.
//! - **Run registry**: a DashMap of the latest run per system, used by the
//!   status endpoint so a client that lost its connection can find out
//!   whether the run finished.
//!
//! # Modules
//!
//! - `engine`: the `AnalysisEngine` seam and the configurable `SimulatedEngine`
//! - `manager`: starts runs, enforces the analysis timeout, records outcomes
//! - `message`: conversion of codec events into axum SSE events
//! - `registry`: run bookkeeping keyed by system id
//! - `sequencer`: ordered, terminal-once event emission for one run

pub mod engine;
pub mod manager;
pub mod message;
pub mod registry;
pub mod sequencer;

pub use manager::Manager;
