//! Inventory configuration
//!
//! YAML file with environment overrides. Credentials are resolved with
//! the usual precedence: environment variables beat file values, and a
//! `password_file` is only consulted when no inline password is set.

use crate::error::{InventoryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENV_TOKEN: &str = "IONOS_TOKEN";
pub const ENV_USERNAME: &str = "IONOS_USERNAME";
pub const ENV_PASSWORD: &str = "IONOS_PASSWORD";
pub const ENV_API_URL: &str = "IONOS_CLOUD_API_URL";

const DEFAULT_CACHE_MAX_AGE: u64 = 600;

/// Resolved API credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCredentials {
    Token(String),
    Basic { username: String, password: String },
}

impl InventoryCredentials {
    /// Identity the cache snapshot is keyed by. Tokens are reduced to a
    /// fingerprint so the secret never lands in the cache file.
    pub fn account_key(&self) -> String {
        match self {
            InventoryCredentials::Token(token) => {
                use std::hash::{DefaultHasher, Hash, Hasher};
                let mut hasher = DefaultHasher::new();
                token.hash(&mut hasher);
                format!("token-{:016x}", hasher.finish())
            }
            InventoryCredentials::Basic { username, .. } => username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InventoryConfig {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub password_file: Option<PathBuf>,
    pub api_url: Option<String>,

    pub cache_path: Option<PathBuf>,
    /// Seconds a cached snapshot stays valid; 0 disables caching
    pub cache_max_age: u64,

    /// Variables merged into every inventory group
    pub vars: BTreeMap<String, serde_json::Value>,

    pub group_by_datacenter_id: bool,
    pub group_by_location: bool,
    pub group_by_availability_zone: bool,
    /// Key hosts by server name instead of server id
    pub server_name_as_inventory_hostname: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            password: None,
            password_file: None,
            api_url: None,
            cache_path: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            vars: BTreeMap::new(),
            group_by_datacenter_id: true,
            group_by_location: true,
            group_by_availability_zone: false,
            server_name_as_inventory_hostname: false,
        }
    }
}

impl InventoryConfig {
    /// Read a YAML config file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Ok(username) = std::env::var(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.api_url = Some(url);
        }
    }

    /// Resolve credentials, reading `password_file` if needed.
    /// Fails before any network call when nothing usable is configured.
    pub fn credentials(&self) -> Result<InventoryCredentials> {
        if let Some(token) = &self.token {
            return Ok(InventoryCredentials::Token(token.clone()));
        }

        let Some(username) = &self.username else {
            return Err(InventoryError::MissingCredentials);
        };
        let password = match (&self.password, &self.password_file) {
            (Some(password), _) => password.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| {
                    InventoryError::Config(format!(
                        "could not read password file {}: {e}",
                        path.display()
                    ))
                })?
                .trim_end()
                .to_string(),
            (None, None) => return Err(InventoryError::MissingCredentials),
        };

        Ok(InventoryCredentials::Basic {
            username: username.clone(),
            password,
        })
    }

    /// Cache file location; `None` when caching is disabled
    pub fn cache_file(&self) -> Option<PathBuf> {
        if self.cache_max_age == 0 {
            return None;
        }
        let dir = self
            .cache_path
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("cumulus")))?;
        Some(dir.join("cumulus-inventory.json"))
    }
}
