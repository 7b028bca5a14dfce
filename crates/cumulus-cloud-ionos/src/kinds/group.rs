//! Permission group kind
//!
//! Groups carry their permission flags as plain properties, so the
//! shared declared-field diff covers everything. Membership is managed
//! from the user side.

use super::{diff_declared, mutation_from, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, GroupProps};
use async_trait::async_trait;
use cumulus_cloud::{Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &[
    "createDataCenter",
    "createSnapshot",
    "reserveIp",
    "accessActivityLog",
];

pub struct GroupKind {
    client: Arc<IonosClient>,
}

impl GroupKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceKind for GroupKind {
    fn kind(&self) -> &str {
        "group"
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let list: ApiList<GroupProps> = self
            .client
            .get_json(&self.client.api("/um/groups?depth=1"))
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
        let mut props: GroupProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());

        let (resource, request_id): (ApiResource<GroupProps>, _) = self
            .client
            .post_json(
                &self.client.api("/um/groups"),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create group {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: GroupProps = typed_attrs(spec)?;
        props.name = spec.name.clone().or_else(|| Some(observed.name.clone()));

        let (resource, request_id): (ApiResource<GroupProps>, _) = self
            .client
            .put_json(
                &self.client.api(&format!("/um/groups/{}", observed.id)),
                &serde_json::json!({ "properties": props }),
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
            format!("update group {name}"),
        ))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let request_id = self
            .client
            .delete(&self.client.api(&format!("/um/groups/{}", observed.id)))
            .await?;
        Ok(request_id
            .map(|id| OperationHandle::new(id, format!("delete group {}", observed.name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind() -> GroupKind {
        let client = IonosClient::new(
            crate::client::Credentials::Token("test".to_string()),
            None,
        )
        .unwrap();
        GroupKind::new(Arc::new(client))
    }

    #[test]
    fn test_permission_drift_triggers_update() {
        let spec = ResourceSpec::new("group").with_attrs(json!({"createDataCenter": true}));
        let observed = Observed::new("g-1", "ops")
            .with_properties(json!({"createDataCenter": false, "reserveIp": true}));

        assert!(kind().diff(&spec, &observed).unwrap());
    }

    #[test]
    fn test_matching_permissions_are_a_noop() {
        let spec = ResourceSpec::new("group")
            .with_attrs(json!({"createDataCenter": true, "reserveIp": true}));
        let observed = Observed::new("g-1", "ops")
            .with_properties(json!({"createDataCenter": true, "reserveIp": true}));

        assert!(!kind().diff(&spec, &observed).unwrap());
    }
}
