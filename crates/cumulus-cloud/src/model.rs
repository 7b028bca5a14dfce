//! Resource model: declared specifications and observed provider state

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User-declared target for a resource's existence/lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Present,
    Absent,
    Update,
    Running,
    Stopped,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
            DesiredState::Update => write!(f, "update"),
            DesiredState::Running => write!(f, "running"),
            DesiredState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Provider-reported lifecycle state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Available,
    Busy,
    Inactive,
    Running,
    Shutoff,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Available => write!(f, "AVAILABLE"),
            LifecycleState::Busy => write!(f, "BUSY"),
            LifecycleState::Inactive => write!(f, "INACTIVE"),
            LifecycleState::Running => write!(f, "RUNNING"),
            LifecycleState::Shutoff => write!(f, "SHUTOFF"),
            LifecycleState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Declared specification for one resource, immutable per invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource kind name (e.g. "server", "lan", "user")
    pub kind: String,

    /// Natural key within the parent scope. Enumerated via a `%d`
    /// template when `count > 1`.
    #[serde(default)]
    pub name: Option<String>,

    /// Explicit provider id, when known
    #[serde(default)]
    pub id: Option<String>,

    /// Ids or names addressing existing resources (update/absent)
    #[serde(default)]
    pub instance_ids: Vec<String>,

    /// Number of homogeneous members to manage
    #[serde(default = "default_count")]
    pub count: u32,

    /// Parent datacenter (name or id) for datacenter-scoped kinds
    #[serde(default)]
    pub datacenter: Option<String>,

    /// Parent server (name or id) for server-scoped kinds
    #[serde(default)]
    pub server: Option<String>,

    /// Kind-specific attributes, deserialized by the kind handler
    #[serde(default)]
    pub attrs: serde_json::Value,
}

fn default_count() -> u32 {
    1
}

impl ResourceSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            id: None,
            instance_ids: Vec::new(),
            count: 1,
            datacenter: None,
            server: None,
            attrs: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attrs(mut self, attrs: serde_json::Value) -> Self {
        self.attrs = attrs;
        self
    }

    /// Get a declared attribute as a specific type
    pub fn attr<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attrs
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether the attribute was declared at all (a declared `null`
    /// still counts as undeclared for diff purposes)
    pub fn has_attr(&self, key: &str) -> bool {
        matches!(self.attrs.get(key), Some(v) if !v.is_null())
    }
}

/// Live provider-reported representation of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observed {
    /// Provider-assigned resource id
    pub id: String,

    /// Resource name (natural key within its parent scope)
    pub name: String,

    /// Lifecycle state reported by the provider
    pub state: LifecycleState,

    /// Flattened resource properties
    pub properties: serde_json::Value,

    /// Related entity id sets (group memberships, NIC IPs, ...)
    #[serde(default)]
    pub relations: HashMap<String, Vec<String>>,
}

impl Observed {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: LifecycleState::Unknown,
            properties: serde_json::Value::Null,
            relations: HashMap::new(),
        }
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_relation(mut self, key: impl Into<String>, ids: Vec<String>) -> Self {
        self.relations.insert(key.into(), ids);
        self
    }

    /// Get an observed property as a specific type
    pub fn property<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn relation(&self, key: &str) -> &[String] {
        self.relations.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Per-member action counts for one reconcile invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl ChangeSummary {
    pub fn merge(&mut self, other: ChangeSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
    }

    pub fn changed(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

/// Result of reconciling one specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Whether any mutating call was issued
    pub changed: bool,

    /// Action counts across all members
    #[serde(default)]
    pub summary: ChangeSummary,

    /// Final observed resources (empty after deletions)
    pub resources: Vec<Observed>,
}

/// Locate a resource by id or natural key within an observed list.
///
/// Zero matches is "absent" (`Ok(None)`); more than one match is always
/// a hard error, never a guess.
pub fn find_unique<'a>(
    kind: &str,
    items: &'a [Observed],
    identity: &str,
) -> Result<Option<&'a Observed>> {
    let matches: Vec<&Observed> = items
        .iter()
        .filter(|r| r.id == identity || r.name == identity)
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        n => Err(CloudError::Ambiguous {
            kind: kind.to_string(),
            identity: identity.to_string(),
            matches: n,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_unique_by_id_and_name() {
        let items = vec![
            Observed::new("id-1", "alpha"),
            Observed::new("id-2", "beta"),
        ];

        assert_eq!(find_unique("lan", &items, "id-2").unwrap().unwrap().name, "beta");
        assert_eq!(find_unique("lan", &items, "alpha").unwrap().unwrap().id, "id-1");
        assert!(find_unique("lan", &items, "gamma").unwrap().is_none());
    }

    #[test]
    fn test_find_unique_refuses_ambiguity() {
        let items = vec![
            Observed::new("id-1", "alpha"),
            Observed::new("id-2", "alpha"),
        ];

        let err = find_unique("server", &items, "alpha").unwrap_err();
        assert!(matches!(err, CloudError::Ambiguous { matches: 2, .. }));
    }

    #[test]
    fn test_spec_attr_access() {
        let spec = ResourceSpec::new("server").with_attrs(serde_json::json!({
            "cores": 4,
            "cpu_family": "INTEL_SKYLAKE",
            "boot_cdrom": null,
        }));

        assert_eq!(spec.attr::<u32>("cores"), Some(4));
        assert!(spec.has_attr("cpu_family"));
        assert!(!spec.has_attr("boot_cdrom"));
        assert!(!spec.has_attr("ram"));
    }
}
