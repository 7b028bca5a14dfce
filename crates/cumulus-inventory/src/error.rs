//! Inventory error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no credentials configured: set a token or a username and password")]
    MissingCredentials,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
