//! Inventory group construction
//!
//! Turns a flat list of host records into the grouped inventory
//! structure. Grouping axes are opt-in through the config; `vars` from
//! the config are merged into every group.

use crate::config::InventoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One server as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: String,
    pub name: String,
    pub datacenter_id: String,
    pub location: Option<String>,
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    pub vm_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, serde_json::Value>,
}

/// Grouped inventory, ready to serialize as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    pub hosts: BTreeMap<String, serde_json::Value>,
    pub groups: BTreeMap<String, Group>,
}

/// Group names must be usable as identifiers downstream
fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn build_inventory(records: &[HostRecord], config: &InventoryConfig) -> Inventory {
    let mut inventory = Inventory::default();

    for record in records {
        let hostname = if config.server_name_as_inventory_hostname {
            record.name.clone()
        } else {
            record.id.clone()
        };

        let hostvars = serde_json::json!({
            "id": record.id,
            "name": record.name,
            "datacenter_id": record.datacenter_id,
            "location": record.location,
            "availability_zone": record.availability_zone,
            "ip_addresses": record.ip_addresses,
            "vm_state": record.vm_state,
        });
        inventory.hosts.insert(hostname.clone(), hostvars);

        let mut group_keys = Vec::new();
        if config.group_by_datacenter_id {
            group_keys.push(sanitize(&record.datacenter_id));
        }
        if config.group_by_location
            && let Some(location) = &record.location
        {
            group_keys.push(sanitize(location));
        }
        if config.group_by_availability_zone
            && let Some(zone) = &record.availability_zone
        {
            group_keys.push(sanitize(zone));
        }

        for key in group_keys {
            let group = inventory.groups.entry(key).or_default();
            if !group.hosts.contains(&hostname) {
                group.hosts.push(hostname.clone());
            }
        }
    }

    for group in inventory.groups.values_mut() {
        group.vars = config.vars.clone();
    }

    inventory
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<HostRecord> {
        vec![
            HostRecord {
                id: "srv-1".to_string(),
                name: "web-1".to_string(),
                datacenter_id: "dc-1".to_string(),
                location: Some("de/fra".to_string()),
                availability_zone: Some("ZONE_1".to_string()),
                ip_addresses: vec!["10.0.0.1".to_string()],
                vm_state: Some("RUNNING".to_string()),
            },
            HostRecord {
                id: "srv-2".to_string(),
                name: "web-2".to_string(),
                datacenter_id: "dc-1".to_string(),
                location: Some("de/fra".to_string()),
                availability_zone: None,
                ip_addresses: vec![],
                vm_state: Some("SHUTOFF".to_string()),
            },
        ]
    }

    #[test]
    fn test_hosts_keyed_by_id_by_default() {
        let inventory = build_inventory(&records(), &InventoryConfig::default());
        assert!(inventory.hosts.contains_key("srv-1"));
        assert!(!inventory.hosts.contains_key("web-1"));
    }

    #[test]
    fn test_hosts_keyed_by_name_when_configured() {
        let config = InventoryConfig {
            server_name_as_inventory_hostname: true,
            ..Default::default()
        };
        let inventory = build_inventory(&records(), &config);
        assert!(inventory.hosts.contains_key("web-1"));
    }

    #[test]
    fn test_location_groups_are_sanitized() {
        let inventory = build_inventory(&records(), &InventoryConfig::default());
        let group = inventory.groups.get("de_fra").unwrap();
        assert_eq!(group.hosts, vec!["srv-1", "srv-2"]);
    }

    #[test]
    fn test_vars_merged_into_every_group() {
        let mut config = InventoryConfig::default();
        config
            .vars
            .insert("ansible_user".to_string(), serde_json::json!("root"));
        let inventory = build_inventory(&records(), &config);

        for group in inventory.groups.values() {
            assert_eq!(group.vars.get("ansible_user"), Some(&serde_json::json!("root")));
        }
    }

    #[test]
    fn test_zone_grouping_is_opt_in() {
        let inventory = build_inventory(&records(), &InventoryConfig::default());
        assert!(!inventory.groups.contains_key("ZONE_1"));

        let config = InventoryConfig {
            group_by_availability_zone: true,
            ..Default::default()
        };
        let inventory = build_inventory(&records(), &config);
        assert_eq!(inventory.groups.get("ZONE_1").unwrap().hosts, vec!["srv-1"]);
    }
}
