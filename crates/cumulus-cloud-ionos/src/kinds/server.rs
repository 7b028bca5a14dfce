//! Server kind, including power transitions

use super::{diff_declared, mutation_from, resolve_datacenter_id, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, ServerProps};
use async_trait::async_trait;
use cumulus_cloud::{
    CloudError, Mutation, Observed, OperationHandle, PowerState, ResourceKind, ResourceSpec,
    Result,
};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &["cores", "ram", "availabilityZone", "cpuFamily"];

pub struct ServerKind {
    client: Arc<IonosClient>,
}

impl ServerKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }

    fn server_url(&self, datacenter_id: &str, server_id: &str) -> String {
        self.client
            .api(&format!("/datacenters/{datacenter_id}/servers/{server_id}"))
    }
}

#[async_trait]
impl ResourceKind for ServerKind {
    fn kind(&self) -> &str {
        "server"
    }

    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let list: ApiList<ServerProps> = self
            .client
            .get_json(
                &self
                    .client
                    .api(&format!("/datacenters/{datacenter_id}/servers?depth=1")),
            )
            .await?;
        list.items
            .iter()
            .map(|r| to_observed(r, r.properties.name.clone().unwrap_or_default()))
            .collect()
    }

    fn diff(&self, spec: &ResourceSpec, observed: &Observed) -> Result<bool> {
        Ok(diff_declared(spec, observed, MUTABLE_FIELDS))
    }

    async fn create(&self, spec: &ResourceSpec, name: &str) -> Result<Mutation> {
        let mut props: ServerProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());
        props.vm_state = None;
        if props.cores.is_none() || props.ram.is_none() {
            return Err(CloudError::Validation(
                "cores and ram are required to create a server".to_string(),
            ));
        }

        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let (resource, request_id): (ApiResource<ServerProps>, _) = self
            .client
            .post_json(
                &self
                    .client
                    .api(&format!("/datacenters/{datacenter_id}/servers")),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create server {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: ServerProps = typed_attrs(spec)?;
        props.name = spec.name.clone();
        props.vm_state = None;

        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let (resource, request_id): (ApiResource<ServerProps>, _) = self
            .client
            .patch_json(&self.server_url(&datacenter_id, &observed.id), &props)
            .await?;

        let name = resource
            .properties
            .name
            .clone()
            .unwrap_or_else(|| observed.name.clone());
        Ok(mutation_from(
            to_observed(&resource, &name)?,
            request_id,
            format!("update server {name}"),
        ))
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let request_id = self
            .client
            .delete(&self.server_url(&datacenter_id, &observed.id))
            .await?;
        Ok(request_id
            .map(|id| OperationHandle::new(id, format!("delete server {}", observed.name))))
    }

    async fn power(
        &self,
        spec: &ResourceSpec,
        observed: &Observed,
        target: PowerState,
    ) -> Result<Mutation> {
        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let verb = match target {
            PowerState::Running => "start",
            PowerState::Stopped => "stop",
        };
        let request_id = self
            .client
            .post_empty(&format!(
                "{}/{verb}",
                self.server_url(&datacenter_id, &observed.id)
            ))
            .await?;

        // Reflect the requested state; the poller confirms completion
        let mut resource = observed.clone();
        if let Some(props) = resource.properties.as_object_mut() {
            let vm_state = match target {
                PowerState::Running => "RUNNING",
                PowerState::Stopped => "SHUTOFF",
            };
            props.insert("vmState".to_string(), serde_json::json!(vm_state));
        }

        Ok(mutation_from(
            resource,
            request_id,
            format!("{verb} server {}", observed.name),
        ))
    }

    fn power_state(&self, observed: &Observed) -> Option<PowerState> {
        match observed.property::<String>("vmState").as_deref() {
            Some("RUNNING") => Some(PowerState::Running),
            Some("SHUTOFF") | Some("SHUTDOWN") => Some(PowerState::Stopped),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind() -> ServerKind {
        let client = IonosClient::new(
            crate::client::Credentials::Token("test".to_string()),
            None,
        )
        .unwrap();
        ServerKind::new(Arc::new(client))
    }

    #[test]
    fn test_power_state_from_vm_state() {
        let kind = kind();
        let running =
            Observed::new("srv-1", "web").with_properties(json!({"vmState": "RUNNING"}));
        let stopped =
            Observed::new("srv-2", "web").with_properties(json!({"vmState": "SHUTOFF"}));
        let pending = Observed::new("srv-3", "web").with_properties(json!({}));

        assert_eq!(kind.power_state(&running), Some(PowerState::Running));
        assert_eq!(kind.power_state(&stopped), Some(PowerState::Stopped));
        assert_eq!(kind.power_state(&pending), None);
    }

    #[test]
    fn test_sizing_drift_triggers_update() {
        let spec = ResourceSpec::new("server").with_attrs(json!({"cores": 4, "ram": 4096}));
        let observed = Observed::new("srv-1", "web")
            .with_properties(json!({"cores": 2, "ram": 4096, "vmState": "RUNNING"}));

        assert!(kind().diff(&spec, &observed).unwrap());
    }

    #[test]
    fn test_vm_state_never_forces_update() {
        let spec = ResourceSpec::new("server").with_attrs(json!({"cores": 2}));
        let observed = Observed::new("srv-1", "web")
            .with_properties(json!({"cores": 2, "vmState": "SHUTOFF"}));

        assert!(!kind().diff(&spec, &observed).unwrap());
    }
}
