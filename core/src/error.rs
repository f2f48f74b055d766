//! Error type for session execution.
//!
//! # Design
//! The transport is the only thing that can fail, so there is exactly one
//! variant. The numeric `code` is the transport's stable status identifier
//! (a libcurl `CURLcode` for the default transport) and `description` is the
//! transport's human-readable message for that status.

use thiserror::Error;

/// Errors returned by `Session::perform`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport reported a non-success status for the transfer.
    #[error("transport failure ({code}): {description}")]
    Transport { code: u32, description: String },
}

impl RequestError {
    /// Build a transport failure from a libcurl-style status code and message.
    pub fn curl(code: u32, description: impl Into<String>) -> Self {
        RequestError::Transport {
            code,
            description: description.into(),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            RequestError::Transport { code, .. } => *code,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            RequestError::Transport { description, .. } => description,
        }
    }
}

impl From<curl::Error> for RequestError {
    fn from(err: curl::Error) -> Self {
        RequestError::curl(err.code(), err.description())
    }
}
