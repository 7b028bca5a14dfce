//! IONOS provider error types

use cumulus_cloud::CloudError;
use thiserror::Error;

/// Errors raised by the IONOS API client
#[derive(Error, Debug)]
pub enum IonosError {
    #[error("IONOS API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<IonosError> for CloudError {
    fn from(e: IonosError) -> Self {
        match e {
            IonosError::Api { status, message } => CloudError::Provider {
                status: Some(status),
                message,
            },
            IonosError::Http(e) => CloudError::Provider {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            IonosError::Json(e) => CloudError::Json(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, IonosError>;
