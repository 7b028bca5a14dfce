//! Volume kind
//!
//! Datacenter-scoped block storage. The `image` attribute accepts
//! either an image id or an alias; ids travel as `image`, everything
//! else as `imageAlias`. When the spec names a server the volume is
//! attached right after the create is accepted, and the attach request
//! becomes the operation handle.

use super::{
    diff_declared, mutation_from, resolve_datacenter_id, resolve_server_id, to_observed,
    typed_attrs,
};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, VolumeProps};
use async_trait::async_trait;
use cumulus_cloud::{Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result};
use regex::Regex;
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &[
    "size",
    "bus",
    "availabilityZone",
    "cpuHotPlug",
    "ramHotPlug",
    "nicHotPlug",
    "nicHotUnplug",
    "discVirtioHotPlug",
    "discVirtioHotUnplug",
];

const DEFAULT_SIZE_GB: u32 = 10;

pub struct VolumeKind {
    client: Arc<IonosClient>,
}

impl VolumeKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }

    fn volumes_url(&self, datacenter_id: &str) -> String {
        self.client
            .api(&format!("/datacenters/{datacenter_id}/volumes"))
    }

    async fn attach(
        &self,
        spec: &ResourceSpec,
        datacenter_id: &str,
        volume_id: &str,
    ) -> Result<Option<String>> {
        let server_id = resolve_server_id(&self.client, datacenter_id, spec).await?;
        tracing::info!("attaching volume {volume_id} to server {server_id}");
        let (_, request_id): (ApiResource<VolumeProps>, _) = self
            .client
            .post_json(
                &self
                    .client
                    .api(&format!("/datacenters/{datacenter_id}/servers/{server_id}/volumes")),
                &serde_json::json!({ "id": volume_id }),
            )
            .await?;
        Ok(request_id)
    }
}

fn is_uuid(value: &str) -> bool {
    let re = Regex::new(
        r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$",
    )
    .unwrap();
    re.is_match(value)
}

/// Route the declared image to the field the API expects
fn route_image(props: &mut VolumeProps) {
    if let Some(image) = props.image.take() {
        if is_uuid(&image) {
            props.image = Some(image);
        } else {
            props.image_alias = Some(image);
        }
    }
}

#[async_trait]
impl ResourceKind for VolumeKind {
    fn kind(&self) -> &str {
        "volume"
    }

    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let list: ApiList<VolumeProps> = self
            .client
            .get_json(&format!("{}?depth=1", self.volumes_url(&datacenter_id)))
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
        let mut props: VolumeProps = typed_attrs(spec)?;
        props.name = Some(name.to_string());
        props.size.get_or_insert(DEFAULT_SIZE_GB);
        route_image(&mut props);
        if props.image.is_none() && props.image_alias.is_none() {
            props.licence_type.get_or_insert_with(|| "UNKNOWN".to_string());
        }

        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let (resource, request_id): (ApiResource<VolumeProps>, _) = self
            .client
            .post_json(
                &self.volumes_url(&datacenter_id),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        let request_id = if spec.server.is_some() {
            self.attach(spec, &datacenter_id, &resource.id)
                .await?
                .or(request_id)
        } else {
            request_id
        };

        Ok(mutation_from(
            to_observed(&resource, name)?,
            request_id,
            format!("create volume {name}"),
        ))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: VolumeProps = typed_attrs(spec)?;
        props.name = spec.name.clone().or_else(|| Some(observed.name.clone()));
        // Immutable at the API; never resent on update
        props.image = None;
        props.image_alias = None;
        props.licence_type = None;
        props.backupunit_id = None;
        props.user_data = None;

        let datacenter_id = resolve_datacenter_id(&self.client, spec).await?;
        let (resource, request_id): (ApiResource<VolumeProps>, _) = self
            .client
            .put_json(
                &format!("{}/{}", self.volumes_url(&datacenter_id), observed.id),
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
            format!("update volume {name}"),
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
            .delete(&format!("{}/{}", self.volumes_url(&datacenter_id), observed.id))
            .await?;
        Ok(request_id
            .map(|id| OperationHandle::new(id, format!("delete volume {}", observed.name))))
    }
}
