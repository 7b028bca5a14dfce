//! Reserved IP block kind
//!
//! Blocks are reserved at a location with a fixed size; only the name
//! can change afterwards.

use super::{diff_declared, mutation_from, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, IpBlockProps};
use async_trait::async_trait;
use cumulus_cloud::{
    CloudError, Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result,
};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &[];

pub struct IpBlockKind {
    client: Arc<IonosClient>,
}

impl IpBlockKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceKind for IpBlockKind {
    fn kind(&self) -> &str {
        "ipblock"
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let list: ApiList<IpBlockProps> = self
            .client
            .get_json(&self.client.api("/ipblocks?depth=1"))
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
        let mut props: IpBlockProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());
        props.ips = None;
        if props.location.is_none() || props.size.is_none() {
            return Err(CloudError::Validation(
                "location and size are required to reserve an ipblock".to_string(),
            ));
        }

        let (resource, request_id): (ApiResource<IpBlockProps>, _) = self
            .client
            .post_json(
                &self.client.api("/ipblocks"),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("reserve ipblock {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let props = IpBlockProps {
            name: spec.name.clone().or_else(|| Some(observed.name.clone())),
            ..Default::default()
        };

        let (resource, request_id): (ApiResource<IpBlockProps>, _) = self
            .client
            .patch_json(&self.client.api(&format!("/ipblocks/{}", observed.id)), &props)
            .await?;

        let name = resource
            .properties
            .name
            .clone()
            .unwrap_or_else(|| observed.name.clone());
        Ok(mutation_from(
            to_observed(&resource, &name)?,
            request_id,
            format!("update ipblock {name}"),
        ))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let request_id = self
            .client
            .delete(&self.client.api(&format!("/ipblocks/{}", observed.id)))
            .await?;
        Ok(request_id
            .map(|id| OperationHandle::new(id, format!("release ipblock {}", observed.name))))
    }
}
