//! LAN kind

use super::{diff_declared, mutation_from, resolve_datacenter_id, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, LanProps};
use async_trait::async_trait;
use cumulus_cloud::{Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &["public"];

pub struct LanKind {
    client: Arc<IonosClient>,
}

impl LanKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceKind for LanKind {
    fn kind(&self) -> &str {
        "lan"
    }

    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let list: ApiList<LanProps> = self
            .client
            .get_json(
                &self
                    .client
                    .api(&format!("/datacenters/{datacenter_id}/lans?depth=1")),
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
        let mut props: LanProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());

        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let (resource, request_id): (ApiResource<LanProps>, _) = self
            .client
            .post_json(
                &self.client.api(&format!("/datacenters/{datacenter_id}/lans")),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create lan {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: LanProps = typed_attrs(spec)?;
        props.name = spec.name.clone();

        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let (resource, request_id): (ApiResource<LanProps>, _) = self
            .client
            .patch_json(
                &self
                    .client
                    .api(&format!("/datacenters/{datacenter_id}/lans/{}", observed.id)),
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
            format!("update lan {name}"),
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
            .delete(
                &self
                    .client
                    .api(&format!("/datacenters/{datacenter_id}/lans/{}", observed.id)),
            )
            .await?;
        Ok(request_id.map(|id| OperationHandle::new(id, format!("delete lan {}", observed.name))))
    }
}
