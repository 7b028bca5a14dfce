//! Playbook file parsing
//!
//! A playbook is a YAML file declaring the resources to reconcile.
//! Each entry maps onto one `ResourceSpec` plus its desired state and
//! wait behaviour.

use anyhow::Context;
use cumulus_cloud::{DesiredState, ResourceSpec};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Playbook {
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    pub kind: String,

    #[serde(default = "default_state")]
    pub state: DesiredState,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub instance_ids: Vec<String>,
    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub server: Option<String>,

    /// Per-entry override for the invocation-wide wait flag
    #[serde(default)]
    pub wait: Option<bool>,
    /// Per-entry wait timeout in seconds
    #[serde(default)]
    pub wait_timeout: Option<u64>,

    #[serde(default)]
    pub attrs: serde_json::Value,
}

fn default_state() -> DesiredState {
    DesiredState::Present
}

fn default_count() -> u32 {
    1
}

impl ResourceEntry {
    pub fn to_spec(&self) -> ResourceSpec {
        ResourceSpec {
            kind: self.kind.clone(),
            name: self.name.clone(),
            id: self.id.clone(),
            instance_ids: self.instance_ids.clone(),
            count: self.count,
            datacenter: self.datacenter.clone(),
            server: self.server.clone(),
            attrs: self.attrs.clone(),
        }
    }

    /// Human-readable identity for progress output
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            format!("{} {}", self.kind, name)
        } else if let Some(id) = &self.id {
            format!("{} {}", self.kind, id)
        } else if !self.instance_ids.is_empty() {
            format!("{} [{}]", self.kind, self.instance_ids.join(", "))
        } else {
            self.kind.clone()
        }
    }
}

impl Playbook {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read playbook {}", path.display()))?;
        let playbook: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("could not parse playbook {}", path.display()))?;
        Ok(playbook)
    }
}
