use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub error_kind: WebErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// No record of the requested resource.
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self {
            error_kind: WebErrorKind::NotFound(what.into()),
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.error_kind {
            WebErrorKind::NotFound(what) => {
                debug!("Not found: {what}");
                (StatusCode::NOT_FOUND, "NOT FOUND").into_response()
            }
        }
    }
}
