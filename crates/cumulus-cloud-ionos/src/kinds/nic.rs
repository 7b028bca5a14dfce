//! NIC kind
//!
//! The declared IP list has replace semantics: it is the full target
//! set, compared order-insensitively. The API takes the complete list
//! on update, so convergence is a single call here; the set comparison
//! only decides whether that call is needed.

use super::{
    diff_declared, mutation_from, resolve_datacenter_id, resolve_server_id, to_observed,
    typed_attrs,
};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, NicProps};
use async_trait::async_trait;
use cumulus_cloud::{
    CloudError, Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result,
    set_delta,
};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &["dhcp", "firewallActive", "lan"];

pub struct NicKind {
    client: Arc<IonosClient>,
}

impl NicKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }

    async fn scope(&self, spec: &ResourceSpec) -> Result<(String, String)> {
        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let server_id = resolve_server_id(&self.client, &datacenter_id, spec).await?;
        Ok((datacenter_id, server_id))
    }

    fn nics_url(&self, datacenter_id: &str, server_id: &str) -> String {
        self.client
            .api(&format!("/datacenters/{datacenter_id}/servers/{server_id}/nics"))
    }
}

fn declared_ips(spec: &ResourceSpec) -> Option<Vec<String>> {
    spec.attr::<Vec<String>>("ips")
}

fn observed_ips(observed: &Observed) -> Vec<String> {
    observed.property::<Vec<String>>("ips").unwrap_or_default()
}

#[async_trait]
impl ResourceKind for NicKind {
    fn kind(&self) -> &str {
        "nic"
    }

    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let (datacenter_id, server_id) = self.scope(spec).await?;
        let list: ApiList<NicProps> = self
            .client
            .get_json(&format!("{}?depth=1", self.nics_url(&datacenter_id, &server_id)))
            .await?;
        list.items
            .iter()
            .map(|r| to_observed(r, r.properties.name.clone().unwrap_or_default()))
            .collect()
    }

    fn diff(&self, spec: &ResourceSpec, observed: &Observed) -> Result<bool> {
        if diff_declared(spec, observed, MUTABLE_FIELDS) {
            return Ok(true);
        }
        if let Some(target) = declared_ips(spec) {
            return Ok(!set_delta(&observed_ips(observed), &target).is_empty());
        }
        Ok(false)
    }

    async fn create(&self, spec: &ResourceSpec, name: &str) -> Result<Mutation> {
        let mut props: NicProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());
        if props.lan.is_none() {
            return Err(CloudError::Validation(
                "lan is required to create a nic".to_string(),
            ));
        }

        let (datacenter_id, server_id) = self.scope(spec).await?;
        let (resource, request_id): (ApiResource<NicProps>, _) = self
            .client
            .post_json(
                &self.nics_url(&datacenter_id, &server_id),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create nic {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: NicProps = typed_attrs(spec)?;
        props.name = spec.name.clone();

        if let Some(target) = declared_ips(spec) {
            let delta = set_delta(&observed_ips(observed), &target);
            if !delta.is_empty() {
                tracing::debug!(
                    "nic {}: adding {:?}, removing {:?}",
                    observed.name,
                    delta.add,
                    delta.remove
                );
            }
            props.ips = Some(target);
        }

        let (datacenter_id, server_id) = self.scope(spec).await?;
        let (resource, request_id): (ApiResource<NicProps>, _) = self
            .client
            .patch_json(
                &format!("{}/{}", self.nics_url(&datacenter_id, &server_id), observed.id),
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
            format!("update nic {name}"),
        ))
    }

    async fn delete(
        &self,
        spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let (datacenter_id, server_id) = self.scope(spec).await?;
        let request_id = self
            .client
            .delete(&format!(
                "{}/{}",
                self.nics_url(&datacenter_id, &server_id),
                observed.id
            ))
            .await?;
        Ok(request_id.map(|id| OperationHandle::new(id, format!("delete nic {}", observed.name))))
    }
}
