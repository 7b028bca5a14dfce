//! Virtual datacenter kind

use super::{diff_declared, mutation_from, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, DatacenterProps};
use async_trait::async_trait;
use cumulus_cloud::{
    CloudError, Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result,
};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &["description"];

pub struct DatacenterKind {
    client: Arc<IonosClient>,
}

impl DatacenterKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceKind for DatacenterKind {
    fn kind(&self) -> &str {
        "datacenter"
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let list: ApiList<DatacenterProps> = self
            .client
            .get_json(&self.client.api("/datacenters?depth=1"))
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
        let mut props: DatacenterProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());
        if props.location.is_none() {
            return Err(CloudError::Validation(
                "location is required to create a datacenter".to_string(),
            ));
        }

        let (resource, request_id): (ApiResource<DatacenterProps>, _) = self
            .client
            .post_json(
                &self.client.api("/datacenters"),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create datacenter {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: DatacenterProps = typed_attrs(spec)?;
        props.name = spec.name.clone();
        // Location is immutable
        props.location = None;

        let (resource, request_id): (ApiResource<DatacenterProps>, _) = self
            .client
            .patch_json(
                &self.client.api(&format!("/datacenters/{}", observed.id)),
                &props,
            )
            .await?;

        let name = resource
            .properties
            .name
            .clone()
            .unwrap_or_else(|| observed.name.clone());
        Ok(mutation_from(
            to_observed(&resource, &name)?,
            request_id,
            format!("update datacenter {name}"),
        ))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let request_id = self
            .client
            .delete(&self.client.api(&format!("/datacenters/{}", observed.id)))
            .await?;
        Ok(request_id
            .map(|id| OperationHandle::new(id, format!("delete datacenter {}", observed.name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_description_drift_triggers_update() {
        let spec = ResourceSpec::new("datacenter").with_attrs(json!({"description": "staging"}));
        let observed = Observed::new("dc-1", "tardis")
            .with_properties(json!({"name": "tardis", "description": "prod", "location": "de/fra"}));

        assert!(diff_declared(&spec, &observed, MUTABLE_FIELDS));
    }

    #[test]
    fn test_location_never_forces_update() {
        // Location is immutable; a differing declaration is caught by
        // the provider, not the diff
        let spec = ResourceSpec::new("datacenter").with_attrs(json!({"location": "us/las"}));
        let observed =
            Observed::new("dc-1", "tardis").with_properties(json!({"location": "de/fra"}));

        assert!(!diff_declared(&spec, &observed, MUTABLE_FIELDS));
    }
}
