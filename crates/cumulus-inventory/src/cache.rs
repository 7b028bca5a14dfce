//! Inventory cache
//!
//! One timestamped JSON snapshot per cache file, keyed by account. A
//! load only returns a hit when the snapshot belongs to the requesting
//! account and is younger than the configured maximum age; missing or
//! unreadable files are treated as a miss so the caller falls back to a
//! live fetch.

use crate::error::Result;
use crate::groups::Inventory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    account: String,
    fetched_at: DateTime<Utc>,
    inventory: Inventory,
}

pub struct InventoryCache {
    path: PathBuf,
    max_age_secs: u64,
    account: String,
}

impl InventoryCache {
    pub fn new(path: impl AsRef<Path>, max_age_secs: u64, account: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_age_secs,
            account: account.into(),
        }
    }

    /// Cached inventory if present, owned by this account, and fresh
    /// enough
    pub async fn load(&self) -> Option<Inventory> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(_) => {
                tracing::debug!("no inventory cache at {}", self.path.display());
                return None;
            }
        };
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("discarding unreadable inventory cache: {e}");
                return None;
            }
        };

        if snapshot.account != self.account {
            tracing::debug!("inventory cache belongs to another account");
            return None;
        }

        let age = Utc::now().signed_duration_since(snapshot.fetched_at);
        if age.num_seconds() < 0 || age.num_seconds() as u64 > self.max_age_secs {
            tracing::debug!("inventory cache expired ({}s old)", age.num_seconds());
            return None;
        }

        tracing::debug!("inventory cache hit ({}s old)", age.num_seconds());
        Some(snapshot.inventory)
    }

    pub async fn save(&self, inventory: &Inventory) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
        }

        let snapshot = Snapshot {
            account: self.account.clone(),
            fetched_at: Utc::now(),
            inventory: inventory.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, content).await?;
        tracing::debug!("saved inventory cache to {}", self.path.display());
        Ok(())
    }
}
