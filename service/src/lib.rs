//! Infrastructure shared by the server binary: command line / environment
//! configuration and console logging.

pub mod config;
pub mod logging;
