// Testing Tools Library
//
// This crate provides manual testing utilities for the analysis stream.
// Currently includes:
// - stream-watch: observes one analysis run and prints its progress

pub mod output;
pub mod status_client;
pub mod watch;
