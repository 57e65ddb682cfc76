//! Error types for the `analysis-client` crate.
//!
//! Follows the same pattern as the rest of the workspace: a root Error struct
//! holding an error kind and an optional source.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The stream URL could not be turned into a request.
    InvalidUrl(String),
    /// The transport could not open the connection.
    Transport(String),
}

impl Error {
    pub fn invalid_url(url: &str, reason: impl fmt::Display) -> Self {
        Self {
            source: None,
            error_kind: ErrorKind::InvalidUrl(format!("{url}: {reason}")),
        }
    }

    pub fn transport(reason: impl fmt::Display) -> Self {
        Self {
            source: None,
            error_kind: ErrorKind::Transport(reason.to_string()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::InvalidUrl(detail) => write!(f, "Invalid stream URL {detail}"),
            ErrorKind::Transport(detail) => write!(f, "Failed to open stream: {detail}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
