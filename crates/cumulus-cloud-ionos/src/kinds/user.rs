//! Account user kind
//!
//! The natural key is the email address, carried as the spec's `name`.
//! Group memberships are declared through the `groups` attribute (group
//! names); the full set is the target and convergence issues only the
//! add/remove calls from the symmetric difference.

use super::{diff_declared, mutation_from, to_observed, typed_attrs};
use crate::client::IonosClient;
use crate::types::{ApiList, ApiResource, GroupProps, UserProps};
use async_trait::async_trait;
use cumulus_cloud::{
    CloudError, Mutation, Observed, OperationHandle, ResourceKind, ResourceSpec, Result,
    set_delta,
};
use std::sync::Arc;

const MUTABLE_FIELDS: &[&str] = &[
    "firstname",
    "lastname",
    "administrator",
    "forceSecAuth",
    "active",
];

pub struct UserKind {
    client: Arc<IonosClient>,
}

impl UserKind {
    pub fn new(client: Arc<IonosClient>) -> Self {
        Self { client }
    }

    /// Group (id, name) pairs for membership resolution
    async fn group_index(&self) -> Result<Vec<(String, String)>> {
        let list: ApiList<GroupProps> = self
            .client
            .get_json(&self.client.api("/um/groups?depth=1"))
            .await?;
        Ok(list
            .items
            .iter()
            .map(|r| (r.id.clone(), r.properties.name.clone().unwrap_or_default()))
            .collect())
    }

    fn group_id<'a>(index: &'a [(String, String)], name: &str) -> Result<&'a str> {
        index
            .iter()
            .find(|(id, group_name)| id.as_str() == name || group_name.as_str() == name)
            .map(|(id, _)| id.as_str())
            .ok_or_else(|| CloudError::NotFound {
                kind: "group".to_string(),
                identity: name.to_string(),
            })
    }

    /// Converge the user's memberships onto the declared set
    async fn converge_groups(&self, user_id: &str, observed: &[String], desired: &[String]) -> Result<()> {
        let delta = set_delta(observed, desired);
        if delta.is_empty() {
            return Ok(());
        }

        let index = self.group_index().await?;
        for group in &delta.add {
            let group_id = Self::group_id(&index, group)?;
            tracing::info!("adding user {user_id} to group {group}");
            let (_, _request_id): (serde_json::Value, _) = self
                .client
                .post_json(
                    &self.client.api(&format!("/um/groups/{group_id}/users")),
                    &serde_json::json!({ "id": user_id }),
                )
                .await?;
        }
        for group in &delta.remove {
            let group_id = Self::group_id(&index, group)?;
            tracing::info!("removing user {user_id} from group {group}");
            self.client
                .delete(
                    &self
                        .client
                        .api(&format!("/um/groups/{group_id}/users/{user_id}")),
                )
                .await?;
        }
        Ok(())
    }
}

fn declared_groups(spec: &ResourceSpec) -> Option<Vec<String>> {
    spec.attr::<Vec<String>>("groups")
}

fn membership_ids(resource: &ApiResource<UserProps>) -> Vec<String> {
    resource
        .entities
        .as_ref()
        .and_then(|e| e.get("groups"))
        .and_then(|g| g.get("items"))
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ResourceKind for UserKind {
    fn kind(&self) -> &str {
        "user"
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
        let index = self.group_index().await?;
        let list: ApiList<UserProps> = self
            .client
            .get_json(&self.client.api("/um/users?depth=2"))
            .await?;

        list.items
            .iter()
            .map(|r| {
                let email = r.properties.email.clone().unwrap_or_default();
                let groups = membership_ids(r)
                    .into_iter()
                    .map(|id| {
                        index
                            .iter()
                            .find(|(group_id, _)| *group_id == id)
                            .map(|(_, name)| name.clone())
                            .unwrap_or(id)
                    })
                    .collect();
                Ok(to_observed(r, email)?.with_relation("groups", groups))
            })
            .collect()
    }

    fn diff(&self, spec: &ResourceSpec, observed: &Observed) -> Result<bool> {
        if diff_declared(spec, observed, MUTABLE_FIELDS) {
            return Ok(true);
        }
        if let Some(target) = declared_groups(spec) {
            return Ok(!set_delta(observed.relation("groups"), &target).is_empty());
        }
        Ok(false)
    }

    async fn create(&self, spec: &ResourceSpec, name: &str) -> Result<Mutation> {
        let mut props: UserProps = typed_attrs(spec)?;
        props.email = Some(name.to_string());
        if props.firstname.is_none() || props.lastname.is_none() || props.password.is_none() {
            return Err(CloudError::Validation(
                "firstname, lastname and password are required to create a user".to_string(),
            ));
        }

        let (resource, request_id): (ApiResource<UserProps>, _) = self
            .client
            .post_json(
                &self.client.api("/um/users"),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        if let Some(target) = declared_groups(spec) {
            self.converge_groups(&resource.id, &[], &target).await?;
        }

        let mut observed = to_observed(&resource, name)?;
        if let Some(target) = declared_groups(spec) {
            observed = observed.with_relation("groups", target);
        }
        Ok(mutation_from(observed, request_id, format!("create user {name}")))
    }

    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
        let mut props: UserProps = typed_attrs(spec)?;
        // The API requires the email on every update; the spec's name
        // carries a new address when renaming
        props.email = spec
            .name
            .clone()
            .or_else(|| Some(observed.name.clone()));

        let (resource, request_id): (ApiResource<UserProps>, _) = self
            .client
            .put_json(
                &self.client.api(&format!("/um/users/{}", observed.id)),
                &serde_json::json!({ "properties": props }),
            )
            .await?;

        if let Some(target) = declared_groups(spec) {
            self.converge_groups(&observed.id, observed.relation("groups"), &target)
                .await?;
        }

        let email = resource
            .properties
            .email
            .clone()
            .unwrap_or_else(|| observed.name.clone());
        let mut updated = to_observed(&resource, email)?;
        let groups = declared_groups(spec)
            .unwrap_or_else(|| observed.relation("groups").to_vec());
        updated = updated.with_relation("groups", groups);
        Ok(mutation_from(
            updated,
            request_id,
            format!("update user {}", observed.name),
        ))
    }

    async fn delete(
        &self,
        _spec: &ResourceSpec,
        observed: &Observed,
    ) -> Result<Option<OperationHandle>> {
        let request_id = self
            .client
            .delete(&self.client.api(&format!("/um/users/{}", observed.id)))
            .await?;
        Ok(request_id
            .map(|id| OperationHandle::new(id, format!("delete user {}", observed.name))))
    }
}
