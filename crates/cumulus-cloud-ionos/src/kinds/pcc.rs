//! Private cross-connect kind

use super::{diff_declared, mutation_from, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, PccProps};
use async_trait::async_trait;
use cumulus_cloud::{Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &["description"];

pub struct PccKind {
    client: Arc<IonosClient>,
}

impl PccKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceKind for PccKind {
    fn kind(&self) -> &str {
        "pcc"
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let list: ApiList<PccProps> = self
            .client
            .get_json(&self.client.api("/pccs?depth=1"))
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
        let mut props: PccProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());

        let (resource, request_id): (ApiResource<PccProps>, _) = self
            .client
            .post_json(
                &self.client.api("/pccs"),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create pcc {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: PccProps = typed_attrs(spec)?;
        props.name = spec.name.clone();

        let (resource, request_id): (ApiResource<PccProps>, _) = self
            .client
            .patch_json(&self.client.api(&format!("/pccs/{}", observed.id)), &props)
            .await?;

        let name = resource
            .properties
            .name
            .clone()
            .unwrap_or_else(|| observed.name.clone());
        Ok(mutation_from(
            to_observed(&resource, &name)?,
            request_id,
            format!("update pcc {name}"),
        ))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let request_id = self
            .client
            .delete(&self.client.api(&format!("/pccs/{}", observed.id)))
            .await?;
        Ok(request_id.map(|id| OperationHandle::new(id, format!("delete pcc {}", observed.name))))
    }
}
