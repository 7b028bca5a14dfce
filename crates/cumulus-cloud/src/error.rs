//! Reconciler error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the reconciler and its providers
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("no {kind} matches '{identity}'")]
    NotFound { kind: String, identity: String },

    #[error("found {matches} {kind} resources matching '{identity}', refusing to guess")]
    Ambiguous {
        kind: String,
        identity: String,
        matches: usize,
    },

    #[error("timed out after {}s waiting for the operation to complete", .0.as_secs())]
    Timeout(Duration),

    #[error("operation {handle} failed: {message}")]
    OperationFailed { handle: String, message: String },

    #[error("provider error: {message}")]
    Provider { status: Option<u16>, message: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether a query hitting this error may be retried within the same
    /// overall deadline. Covers network blips and provider 5xx responses;
    /// everything else is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Provider { status, .. } => match status {
                Some(code) => *code >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
