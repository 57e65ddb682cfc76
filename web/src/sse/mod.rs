//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the analysis stream.
//! Run management and event sequencing live in the `sse` crate.

pub(crate) mod handler;
