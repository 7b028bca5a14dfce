//! Resource-kind handlers
//!
//! One `ResourceKind` implementation per supported IONOS resource.
//! The handlers share the same skeleton: list the parent scope, diff
//! only declared fields, and hand mutations back with the provider's
//! request id as the operation handle.

pub mod datacenter;
pub mod group;
pub mod ipblock;
pub mod lan;
pub mod nic;
pub mod pcc;
pub mod postgres_cluster;
pub mod server;
pub mod user;
pub mod volume;

use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, DatacenterProps, ServerProps};
use cumulus_cloud::{
    CloudError, LifecycleState, Mutation, Observed, OperationHandle, Registry, ResourceSpec,
    find_unique,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Build a registry with every kind this provider supports
pub fn registry(client: Arc<IonosClient>) -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(datacenter::DatacenterKind::new(client.clone())));
    registry.register(Arc::new(server::ServerKind::new(client.clone())));
    registry.register(Arc::new(volume::VolumeKind::new(client.clone())));
    registry.register(Arc::new(lan::LanKind::new(client.clone())));
    registry.register(Arc::new(nic::NicKind::new(client.clone())));
    registry.register(Arc::new(ipblock::IpBlockKind::new(client.clone())));
    registry.register(Arc::new(user::UserKind::new(client.clone())));
    registry.register(Arc::new(group::GroupKind::new(client.clone())));
    registry.register(Arc::new(pcc::PccKind::new(client.clone())));
    registry.register(Arc::new(postgres_cluster::PostgresClusterKind::new(client)));
    registry
}

pub(crate) fn lifecycle_from(state: Option<&str>) -> LifecycleState {
    match state {
        Some("AVAILABLE") => LifecycleState::Available,
        Some("BUSY") => LifecycleState::Busy,
        Some("INACTIVE") => LifecycleState::Inactive,
        Some("RUNNING") => LifecycleState::Running,
        Some("SHUTOFF") => LifecycleState::Shutoff,
        _ => LifecycleState::Unknown,
    }
}

/// Map an API envelope into the reconciler's observed representation
pub(crate) fn to_observed<P: Serialize>(
    resource: &ApiResource<P>,
    name: impl Into<String>,
) -> cumulus_cloud::Result<Observed> {
    Ok(Observed::new(resource.id.clone(), name)
        .with_state(lifecycle_from(
            resource.metadata.as_ref().and_then(|m| m.state.as_deref()),
        ))
        .with_properties(serde_json::to_value(&resource.properties)?))
}

/// Deserialize the declared attributes into a kind's property struct.
/// Attributes use the provider's camelCase field names.
pub(crate) fn typed_attrs<P: DeserializeOwned + Default>(
    spec: &ResourceSpec,
) -> cumulus_cloud::Result<P> {
    if spec.attrs.is_null() {
        Ok(P::default())
    } else {
        Ok(serde_json::from_value(spec.attrs.clone())?)
    }
}

/// Field-by-field comparison over declared mutable fields only;
/// undeclared fields never force an update
pub(crate) fn diff_declared(spec: &ResourceSpec, observed: &Observed, fields: &[&str]) -> bool {
    fields.iter().any(|field| match spec.attrs.get(*field) {
        Some(declared) if !declared.is_null() => observed.properties.get(*field) != Some(declared),
        _ => false,
    })
}

/// Wrap a provider response into a mutation, pending when the provider
/// handed back a request id
pub(crate) fn mutation_from(
    observed: Observed,
    request_id: Option<String>,
    label: String,
) -> Mutation {
    match request_id {
        Some(id) => Mutation::pending(observed, OperationHandle::new(id, label)),
        None => Mutation::done(observed),
    }
}

/// Resolve the spec's parent datacenter (name or id) into its id
pub(crate) async fn resolve_datacenter_id(
    client: &IonosClient,
    spec: &ResourceSpec,
) -> cumulus_cloud::Result<String> {
    let identity = spec.datacenter.as_ref().ok_or_else(|| {
        CloudError::Validation(format!("{} resources require a datacenter", spec.kind))
    })?;

    let list: ApiList<DatacenterProps> =
        client.get_json(&client.api("/datacenters?depth=1")).await?;
    let observed = list
        .items
        .iter()
        .map(|r| to_observed(r, r.properties.name.clone().unwrap_or_default()))
        .collect::<cumulus_cloud::Result<Vec<_>>>()?;

    match find_unique("datacenter", &observed, identity)? {
        Some(dc) => Ok(dc.id.clone()),
        None => Err(CloudError::NotFound {
            kind: "datacenter".to_string(),
            identity: identity.clone(),
        }),
    }
}

/// Resolve the spec's parent server (name or id) within a datacenter
pub(crate) async fn resolve_server_id(
    client: &IonosClient,
    datacenter_id: &str,
    spec: &ResourceSpec,
) -> cumulus_cloud::Result<String> {
    let identity = spec.server.as_ref().ok_or_else(|| {
        CloudError::Validation(format!("{} resources require a server", spec.kind))
    })?;

    let list: ApiList<ServerProps> = client
        .get_json(&client.api(&format!("/datacenters/{datacenter_id}/servers?depth=1")))
        .await?;
    let observed = list
        .items
        .iter()
        .map(|r| to_observed(r, r.properties.name.clone().unwrap_or_default()))
        .collect::<cumulus_cloud::Result<Vec<_>>>()?;

    match find_unique("server", &observed, identity)? {
        Some(server) => Ok(server.id.clone()),
        None => Err(CloudError::NotFound {
            kind: "server".to_string(),
            identity: identity.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_mapping() {
        assert_eq!(lifecycle_from(Some("AVAILABLE")), LifecycleState::Available);
        assert_eq!(lifecycle_from(Some("BUSY")), LifecycleState::Busy);
        assert_eq!(lifecycle_from(Some("SHUTOFF")), LifecycleState::Shutoff);
        assert_eq!(lifecycle_from(Some("DESTROYING")), LifecycleState::Unknown);
        assert_eq!(lifecycle_from(None), LifecycleState::Unknown);
    }

    #[test]
    fn test_diff_ignores_undeclared_fields() {
        let spec = ResourceSpec::new("server").with_attrs(json!({"cores": 2}));
        let observed = Observed::new("id-1", "web").with_properties(json!({
            "cores": 2,
            "ram": 4096,
            "cpuFamily": "INTEL_SKYLAKE"
        }));

        assert!(!diff_declared(&spec, &observed, &["cores", "ram", "cpuFamily"]));
    }

    #[test]
    fn test_diff_detects_declared_drift() {
        let spec = ResourceSpec::new("server").with_attrs(json!({"cores": 4, "ram": 4096}));
        let observed =
            Observed::new("id-1", "web").with_properties(json!({"cores": 2, "ram": 4096}));

        assert!(diff_declared(&spec, &observed, &["cores", "ram"]));
    }

    #[test]
    fn test_diff_skips_null_declarations() {
        let spec = ResourceSpec::new("lan").with_attrs(json!({"public": null}));
        let observed = Observed::new("id-1", "backbone").with_properties(json!({"public": true}));

        assert!(!diff_declared(&spec, &observed, &["public"]));
    }
}
