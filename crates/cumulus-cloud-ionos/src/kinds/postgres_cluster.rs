//! Managed Postgres cluster kind
//!
//! Clusters live on the DBaaS API, which returns no request ids.
//! Mutations are tracked through the cluster's own lifecycle state
//! instead, via handles prefixed with `clusters/`. The natural key is
//! the display name. Cluster backups are exposed as a read-only
//! listing.

use super::{diff_declared, to_observed, typed_attrs};
use crate::client::{CLUSTER_HANDLE_PREFIX, IonosClient};
use crate::types::{ApiList, ApiResource, PostgresBackupProps, PostgresClusterProps};
use async_trait::async_trait;
use cumulus_cloud::{
    CloudError, Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result,
    find_unique,
};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &["instances", "cores", "ram", "storageSize", "postgresVersion"];

pub struct PostgresClusterKind {
    client: Arc<IonosClient>,
}

impl PostgresClusterKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }

    fn handle(cluster_id: &str, label: String) -> OperationHandle {
        OperationHandle::new(format!("{CLUSTER_HANDLE_PREFIX}{cluster_id}"), label)
    }

    fn backups_url(&self, cluster_id: Option<&str>) -> String {
        match cluster_id {
            Some(id) => self.client.dbaas(&format!("/clusters/{id}/backups")),
            None => self.client.dbaas("/clusters/backups"),
        }
    }

    /// Backups for one cluster (id or display name), or across all
    /// clusters when none is given
    pub async fn backups(
        &self,
        cluster: Option<&str>,
    ) -> Result<Vec<ApiResource<PostgresBackupProps>>> {
        let cluster_id = match cluster {
            Some(identity) => {
                let observed = self.list(&ResourceSpec::new(self.kind())).await?;
                let cluster = find_unique(self.kind(), &observed, identity)?.ok_or_else(|| {
                    CloudError::NotFound {
                        kind: self.kind().to_string(),
                        identity: identity.to_string(),
                    }
                })?;
                Some(cluster.id.clone())
            }
            None => None,
        };

        let list: ApiList<PostgresBackupProps> = self
            .client
            .get_json(&self.backups_url(cluster_id.as_deref()))
            .await?;
        Ok(list.items)
    }
}

#[async_trait]
impl ResourceKind for PostgresClusterKind {
    fn kind(&self) -> &str {
        "postgres_cluster"
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let list: ApiList<PostgresClusterProps> = self
            .client
            .get_json(&self.client.dbaas("/clusters"))
            .await?;
        list.items
            .iter()
            .map(|r| to_observed(r, r.properties.display_name.clone().unwrap_or_default()))
            .collect()
    }

    fn diff(&self, spec: &ResourceSpec, observed: &Observed) -> Result<bool> {
        Ok(diff_declared(spec, observed, MUTABLE_FIELDS))
    }

    async fn create(&self, spec: &ResourceSpec, name: &str) -> Result<Mutation> {
        let mut props: PostgresClusterProps = typed_attrs(spec)?;
        props.display_name = Some(name.to_string());
        if props.postgres_version.is_none()
            || props.instances.is_none()
            || props.cores.is_none()
            || props.ram.is_none()
            || props.storage_size.is_none()
            || props.location.is_none()
        {
            return Err(CloudError::Validation(
                "postgresVersion, instances, cores, ram, storageSize and location are required \
                 to create a postgres cluster"
                    .to_string(),
            ));
        }

        let (resource, _): (ApiResource<PostgresClusterProps>, _) = self
            .client
            .post_json(
                &self.client.dbaas("/clusters"),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        let handle = Self::handle(&resource.id, format!("create postgres cluster {name}"));
        Ok(Mutation::pending(to_observed(&resource, name)?, handle))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: PostgresClusterProps = typed_attrs(spec)?;
        props.display_name = spec.name.clone();
        // Location is fixed at creation
        props.location = None;

        let (resource, _): (ApiResource<PostgresClusterProps>, _) = self
            .client
            .patch_json(
                &self.client.dbaas(&format!("/clusters/{}", observed.id)),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        let name = resource
            .properties
            .display_name
            .clone()
            .unwrap_or_else(|| observed.name.clone());
        let handle = Self::handle(&resource.id, format!("update postgres cluster {name}"));
        Ok(Mutation::pending(to_observed(&resource, &name)?, handle))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        self.client
            .delete(&self.client.dbaas(&format!("/clusters/{}", observed.id)))
            .await?;
        Ok(Some(Self::handle(
            &observed.id,
            format!("delete postgres cluster {}", observed.name),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind() -> PostgresClusterKind {
        let client = IonosClient::new(
            crate::client::Credentials::Token("test".to_string()),
            None,
        )
        .unwrap();
        PostgresClusterKind::new(Arc::new(client))
    }

    #[test]
    fn test_cluster_handles_carry_the_prefix() {
        let handle = PostgresClusterKind::handle("c-1", "create postgres cluster pg".to_string());
        assert_eq!(handle.id, "clusters/c-1");
    }

    #[test]
    fn test_backup_listing_scopes_to_the_cluster() {
        let kind = kind();
        assert_eq!(
            kind.backups_url(Some("c-1")),
            "https://api.ionos.com/databases/postgresql/clusters/c-1/backups"
        );
        assert_eq!(
            kind.backups_url(None),
            "https://api.ionos.com/databases/postgresql/clusters/backups"
        );
    }

    #[test]
    fn test_sizing_drift_triggers_update() {
        let spec =
            ResourceSpec::new("postgres_cluster").with_attrs(json!({"instances": 3, "cores": 4}));
        let observed = Observed::new("c-1", "pg")
            .with_properties(json!({"instances": 1, "cores": 4, "location": "de/fra"}));

        assert!(kind().diff(&spec, &observed).unwrap());
    }

    #[test]
    fn test_location_never_forces_update() {
        let spec = ResourceSpec::new("postgres_cluster")
            .with_attrs(json!({"instances": 1, "location": "de/txl"}));
        let observed = Observed::new("c-1", "pg")
            .with_properties(json!({"instances": 1, "location": "de/fra"}));

        assert!(!kind().diff(&spec, &observed).unwrap());
    }
}
