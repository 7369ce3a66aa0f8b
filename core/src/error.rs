//! Error taxonomy for vault sync, sample import, and meal lookup.

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport failure, timeout, or a request the server refused
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Network error: {method} {url} returned HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Well-formed response with nothing in it
    #[error("Remote returned no results")]
    EmptyResult,

    /// Local storage write failed
    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),

    /// The engine task has stopped and can no longer accept commands
    #[error("Recipe engine is not running")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Decode,
    EmptyResult,
    Persistence,
    Closed,
}

impl SyncError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Network(_) | SyncError::Status { .. } => ErrorKind::Network,
            SyncError::Decode(_) => ErrorKind::Decode,
            SyncError::EmptyResult => ErrorKind::EmptyResult,
            SyncError::Persistence(_) => ErrorKind::Persistence,
            SyncError::Closed => ErrorKind::Closed,
        }
    }
}

/// Cloneable form of a [`SyncError`], published in engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for ErrorInfo {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
