//! Reconciling resource operator
//!
//! Given a declared specification and a desired state, the reconciler
//! resolves the current provider inventory, computes the minimal
//! mutating action per member (none, create, update, delete, power
//! transition), issues it, and optionally blocks until the provider
//! reports the operation complete or the shared deadline elapses.

use crate::error::{CloudError, Result};
use crate::kind::{Mutation, PowerState, Registry, ResourceKind};
use crate::model::{
    ChangeSummary, DesiredState, Observed, ReconcileOutcome, ResourceSpec, find_unique,
};
use crate::poll::{OperationHandle, OperationSource, PollConfig, PollOutcome, await_completion};
use crate::template::expand_names;
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Action decided for one member during planning
#[derive(Debug, Clone)]
enum MemberAction {
    Create { name: String },
    Update { observed: Observed },
    Delete { observed: Observed },
    Power { observed: Observed, target: PowerState },
    Keep { observed: Option<Observed> },
}

/// Wait parameters shared by all members of one invocation
#[derive(Debug, Clone, Copy)]
struct WaitPlan {
    wait: bool,
    deadline: Instant,
    timeout: Duration,
}

impl WaitPlan {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Drives declared resources to their desired state through the kind
/// registry
pub struct Reconciler {
    registry: Registry,
    operations: Arc<dyn OperationSource>,
    poll: PollConfig,
}

impl Reconciler {
    pub fn new(registry: Registry, operations: Arc<dyn OperationSource>) -> Self {
        Self {
            registry,
            operations,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Reconcile one specification towards `desired`.
    ///
    /// Bulk members are dispatched concurrently under one shared
    /// deadline, each completion tracked independently; `changed`
    /// aggregates by logical OR. Identity is re-resolved immediately
    /// before each mutation; without a provider-side locking primitive
    /// a race between that re-check and the mutating call remains
    /// possible, so overlapping invocations against the same natural
    /// key are the caller's responsibility.
    pub async fn reconcile(
        &self,
        spec: &ResourceSpec,
        desired: DesiredState,
        wait: bool,
        wait_timeout: Duration,
    ) -> Result<ReconcileOutcome> {
        let handler = self.registry.get(&spec.kind)?;

        let selector = Selector::for_state(spec, desired)?;
        let members = selector.members.clone();

        // Renaming targets exactly one resource
        if selector.rename && members.len() > 1 {
            return Err(CloudError::Validation(
                "renaming requires a single instance id".to_string(),
            ));
        }

        let observed = handler.list(spec).await?;

        // A rename must not collide with another resource's name
        if selector.rename {
            if let Some(new_name) = &spec.name {
                if let Some(existing) = find_unique(&spec.kind, &observed, new_name)? {
                    let targets_self = members
                        .iter()
                        .any(|m| *m == existing.id || *m == existing.name);
                    if !targets_self {
                        return Err(CloudError::Validation(format!(
                            "a {} named '{new_name}' already exists",
                            spec.kind
                        )));
                    }
                }
            }
        }

        // Fields the provider should receive on update: when the name
        // only selected the resource it must not travel as a rename.
        let update_spec = if selector.rename {
            spec.clone()
        } else {
            let mut s = spec.clone();
            s.name = None;
            s
        };

        let mut actions = Vec::with_capacity(members.len());
        for member in &members {
            let existing = find_unique(&spec.kind, &observed, member)?.cloned();
            actions.push(self.plan_member(handler.as_ref(), spec, desired, member, existing, &selector)?);
        }

        let plan = WaitPlan {
            wait,
            deadline: Instant::now() + wait_timeout,
            timeout: wait_timeout,
        };

        let results = try_join_all(actions.into_iter().map(|action| {
            let handler = handler.clone();
            let spec = spec;
            let update_spec = &update_spec;
            async move {
                self.apply_member(handler, spec, update_spec, action, plan)
                    .await
            }
        }))
        .await?;

        let mut summary = ChangeSummary::default();
        let mut resources = Vec::new();
        for (member_summary, resource) in results {
            summary.merge(member_summary);
            if let Some(resource) = resource {
                resources.push(resource);
            }
        }

        Ok(ReconcileOutcome {
            changed: summary.changed(),
            summary,
            resources,
        })
    }

    fn plan_member(
        &self,
        handler: &dyn ResourceKind,
        spec: &ResourceSpec,
        desired: DesiredState,
        member: &str,
        existing: Option<Observed>,
        selector: &Selector,
    ) -> Result<MemberAction> {
        let action = match desired {
            DesiredState::Absent => match existing {
                Some(observed) => MemberAction::Delete { observed },
                // Deleting what does not exist is a no-op, never an error
                None => MemberAction::Keep { observed: None },
            },
            DesiredState::Present => match existing {
                None => {
                    if selector.by_id {
                        return Err(CloudError::NotFound {
                            kind: spec.kind.clone(),
                            identity: member.to_string(),
                        });
                    }
                    MemberAction::Create {
                        name: member.to_string(),
                    }
                }
                Some(observed) => {
                    if handler.diff(spec, &observed)? {
                        MemberAction::Update { observed }
                    } else {
                        MemberAction::Keep {
                            observed: Some(observed),
                        }
                    }
                }
            },
            // Explicit update intent always mutates; the provider
            // decides whether identical values are a diff
            DesiredState::Update => match existing {
                None => {
                    return Err(CloudError::NotFound {
                        kind: spec.kind.clone(),
                        identity: member.to_string(),
                    });
                }
                Some(observed) => MemberAction::Update { observed },
            },
            DesiredState::Running | DesiredState::Stopped => {
                let target = if desired == DesiredState::Running {
                    PowerState::Running
                } else {
                    PowerState::Stopped
                };
                match existing {
                    None => {
                        return Err(CloudError::NotFound {
                            kind: spec.kind.clone(),
                            identity: member.to_string(),
                        });
                    }
                    Some(observed) => {
                        if handler.power_state(&observed) == Some(target) {
                            MemberAction::Keep {
                                observed: Some(observed),
                            }
                        } else {
                            MemberAction::Power { observed, target }
                        }
                    }
                }
            }
        };
        Ok(action)
    }

    async fn apply_member(
        &self,
        handler: Arc<dyn ResourceKind>,
        spec: &ResourceSpec,
        update_spec: &ResourceSpec,
        action: MemberAction,
        plan: WaitPlan,
    ) -> Result<(ChangeSummary, Option<Observed>)> {
        let kept = ChangeSummary {
            unchanged: 1,
            ..Default::default()
        };

        match action {
            MemberAction::Keep { observed } => Ok((kept, observed)),

            MemberAction::Create { name } => {
                // Stale-identity guard: the resource may have appeared
                // since planning
                let fresh = handler.list(spec).await?;
                if let Some(existing) = find_unique(&spec.kind, &fresh, &name)? {
                    tracing::debug!("{} {} already exists, skipping create", spec.kind, name);
                    return Ok((kept, Some(existing.clone())));
                }

                tracing::info!("creating {} {}", spec.kind, name);
                let mutation = handler.create(spec, &name).await?;
                let resource = self.settle(mutation, plan).await?;
                Ok((
                    ChangeSummary {
                        created: 1,
                        ..Default::default()
                    },
                    Some(resource),
                ))
            }

            MemberAction::Update { observed } => {
                let fresh = handler.list(spec).await?;
                let current = find_unique(&spec.kind, &fresh, &observed.id)?
                    .ok_or_else(|| CloudError::NotFound {
                        kind: spec.kind.clone(),
                        identity: observed.id.clone(),
                    })?
                    .clone();

                tracing::info!("updating {} {}", spec.kind, current.name);
                let mutation = handler.update(update_spec, &current).await?;
                let resource = self.settle(mutation, plan).await?;
                Ok((
                    ChangeSummary {
                        updated: 1,
                        ..Default::default()
                    },
                    Some(resource),
                ))
            }

            MemberAction::Delete { observed } => {
                let fresh = handler.list(spec).await?;
                let Some(current) = find_unique(&spec.kind, &fresh, &observed.id)? else {
                    tracing::debug!("{} {} already gone", spec.kind, observed.name);
                    return Ok((kept, None));
                };

                tracing::info!("deleting {} {}", spec.kind, current.name);
                let handle = handler.delete(spec, current).await?;
                if let Some(handle) = handle {
                    self.settle_handle(&handle, plan).await?;
                }
                Ok((
                    ChangeSummary {
                        deleted: 1,
                        ..Default::default()
                    },
                    None,
                ))
            }

            MemberAction::Power { observed, target } => {
                let fresh = handler.list(spec).await?;
                let current = find_unique(&spec.kind, &fresh, &observed.id)?
                    .ok_or_else(|| CloudError::NotFound {
                        kind: spec.kind.clone(),
                        identity: observed.id.clone(),
                    })?
                    .clone();
                if handler.power_state(&current) == Some(target) {
                    return Ok((kept, Some(current)));
                }

                tracing::info!("transitioning {} {} to {}", spec.kind, current.name, target);
                let mutation = handler.power(spec, &current, target).await?;
                let resource = self.settle(mutation, plan).await?;
                Ok((
                    ChangeSummary {
                        updated: 1,
                        ..Default::default()
                    },
                    Some(resource),
                ))
            }
        }
    }

    /// Await the mutation's operation handle when waiting is requested
    async fn settle(&self, mutation: Mutation, plan: WaitPlan) -> Result<Observed> {
        if let Some(handle) = &mutation.handle {
            self.settle_handle(handle, plan).await?;
        }
        Ok(mutation.resource)
    }

    async fn settle_handle(&self, handle: &OperationHandle, plan: WaitPlan) -> Result<()> {
        if !plan.wait {
            return Ok(());
        }
        match await_completion(self.operations.as_ref(), handle, plan.remaining(), &self.poll)
            .await?
        {
            PollOutcome::Succeeded => Ok(()),
            PollOutcome::Failed(message) => Err(CloudError::OperationFailed {
                handle: handle.to_string(),
                message,
            }),
            PollOutcome::TimedOut => Err(CloudError::Timeout(plan.timeout)),
        }
    }
}

/// How the invocation addresses its members
struct Selector {
    members: Vec<String>,
    /// Members are explicit ids (present cannot create under an id)
    by_id: bool,
    /// `name` carries a new name instead of selecting
    rename: bool,
}

impl Selector {
    fn for_state(spec: &ResourceSpec, desired: DesiredState) -> Result<Self> {
        match desired {
            DesiredState::Present => {
                if let Some(id) = &spec.id {
                    return Ok(Self {
                        members: vec![id.clone()],
                        by_id: true,
                        rename: false,
                    });
                }
                let name = spec.name.as_ref().ok_or_else(|| {
                    CloudError::Validation(format!(
                        "name is required for {} state present",
                        spec.kind
                    ))
                })?;
                Ok(Self {
                    members: expand_names(name, spec.count),
                    by_id: false,
                    rename: false,
                })
            }
            DesiredState::Absent
            | DesiredState::Update
            | DesiredState::Running
            | DesiredState::Stopped => {
                if !spec.instance_ids.is_empty() {
                    return Ok(Self {
                        members: spec.instance_ids.clone(),
                        by_id: true,
                        rename: desired == DesiredState::Update && spec.name.is_some(),
                    });
                }
                if let Some(id) = &spec.id {
                    return Ok(Self {
                        members: vec![id.clone()],
                        by_id: true,
                        rename: desired == DesiredState::Update && spec.name.is_some(),
                    });
                }
                // Name-only addressing re-derives the same member set
                // the template produced at creation time
                if let Some(name) = &spec.name {
                    return Ok(Self {
                        members: expand_names(name, spec.count),
                        by_id: false,
                        rename: false,
                    });
                }
                Err(CloudError::Validation(format!(
                    "state {desired} requires instance_ids, id, or name"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LifecycleState;
    use crate::poll::OperationStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory resource kind backing the reconciler tests
    struct FakeKind {
        kind: &'static str,
        store: Mutex<Vec<Observed>>,
        calls: Mutex<Vec<String>>,
        next_id: AtomicU32,
        /// Initial lifecycle state for created resources
        initial_state: LifecycleState,
        /// Whether mutations hand back an operation handle
        async_ops: bool,
    }

    impl FakeKind {
        fn new(kind: &'static str) -> Self {
            Self {
                kind,
                store: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                next_id: AtomicU32::new(1),
                initial_state: LifecycleState::Available,
                async_ops: false,
            }
        }

        fn with_async_ops(mut self) -> Self {
            self.async_ops = true;
            self
        }

        fn with_initial_state(mut self, state: LifecycleState) -> Self {
            self.initial_state = state;
            self
        }

        fn seed(&self, observed: Observed) {
            self.store.lock().unwrap().push(observed);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn handle_for(&self, verb: &str, name: &str) -> Option<OperationHandle> {
            self.async_ops
                .then(|| OperationHandle::new(format!("req-{verb}-{name}"), format!("{verb} {name}")))
        }
    }

    #[async_trait]
    impl ResourceKind for FakeKind {
        fn kind(&self) -> &str {
            self.kind
        }

        async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<Observed>> {
            Ok(self.store.lock().unwrap().clone())
        }

        fn diff(&self, spec: &ResourceSpec, observed: &Observed) -> Result<bool> {
            let Some(declared) = spec.attrs.as_object() else {
                return Ok(false);
            };
            for (key, value) in declared {
                if value.is_null() {
                    continue;
                }
                if observed.properties.get(key) != Some(value) {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn create(&self, spec: &ResourceSpec, name: &str) -> Result<Mutation> {
            self.record(format!("create {name}"));
            let id = format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let observed = Observed::new(&id, name)
                .with_state(self.initial_state)
                .with_properties(spec.attrs.clone());
            self.store.lock().unwrap().push(observed.clone());
            match self.handle_for("create", name) {
                Some(handle) => Ok(Mutation::pending(observed, handle)),
                None => Ok(Mutation::done(observed)),
            }
        }

        async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation> {
            self.record(format!("update {}", observed.id));
            let mut store = self.store.lock().unwrap();
            let entry = store.iter_mut().find(|r| r.id == observed.id).unwrap();
            if !spec.attrs.is_null() {
                entry.properties = spec.attrs.clone();
            }
            if let Some(name) = &spec.name {
                entry.name = name.clone();
            }
            let updated = entry.clone();
            drop(store);
            match self.handle_for("update", &updated.name) {
                Some(handle) => Ok(Mutation::pending(updated, handle)),
                None => Ok(Mutation::done(updated)),
            }
        }

        async fn delete(
            &self,
            _spec: &ResourceSpec,
            observed: &Observed,
        ) -> Result<Option<OperationHandle>> {
            self.record(format!("delete {}", observed.id));
            self.store.lock().unwrap().retain(|r| r.id != observed.id);
            Ok(self.handle_for("delete", &observed.name))
        }

        async fn power(
            &self,
            _spec: &ResourceSpec,
            observed: &Observed,
            target: PowerState,
        ) -> Result<Mutation> {
            self.record(format!("power {} {target}", observed.id));
            let mut store = self.store.lock().unwrap();
            let entry = store.iter_mut().find(|r| r.id == observed.id).unwrap();
            entry.state = match target {
                PowerState::Running => LifecycleState::Running,
                PowerState::Stopped => LifecycleState::Shutoff,
            };
            let updated = entry.clone();
            Ok(Mutation::done(updated))
        }
    }

    /// Operation source with a fixed answer for every handle
    struct FixedOps(OperationStatus);

    #[async_trait]
    impl OperationSource for FixedOps {
        async fn operation_status(&self, _handle: &OperationHandle) -> Result<OperationStatus> {
            Ok(self.0.clone())
        }
    }

    fn reconciler_for(kind: Arc<FakeKind>, ops: OperationStatus) -> Reconciler {
        let mut registry = Registry::new();
        registry.register(kind);
        Reconciler::new(registry, Arc::new(FixedOps(ops)))
    }

    fn server_spec(name: &str) -> ResourceSpec {
        ResourceSpec::new("server")
            .with_name(name)
            .with_attrs(json!({"cores": 2, "ram": 2048}))
    }

    const WAIT: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn test_present_is_idempotent() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);
        let spec = server_spec("web");

        let first = reconciler
            .reconcile(&spec, DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        assert!(first.changed);
        assert_eq!(first.resources.len(), 1);

        let second = reconciler
            .reconcile(&spec, DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.resources[0].id, first.resources[0].id);
        assert_eq!(second.resources[0].properties, first.resources[0].properties);
        assert_eq!(kind.calls(), vec!["create web"]);
    }

    #[tokio::test]
    async fn test_present_updates_on_drift() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        reconciler
            .reconcile(&server_spec("web"), DesiredState::Present, true, WAIT)
            .await
            .unwrap();

        let grown = ResourceSpec::new("server")
            .with_name("web")
            .with_attrs(json!({"cores": 4, "ram": 2048}));
        let outcome = reconciler
            .reconcile(&grown, DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.resources[0].property::<u32>("cores"), Some(4));
    }

    #[tokio::test]
    async fn test_absent_on_missing_resource_is_noop() {
        let kind = Arc::new(FakeKind::new("lan"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        let mut spec = ResourceSpec::new("lan");
        spec.instance_ids = vec!["does-not-exist".to_string()];

        let outcome = reconciler
            .reconcile(&spec, DesiredState::Absent, true, WAIT)
            .await
            .unwrap();
        assert!(!outcome.changed);
        assert!(outcome.resources.is_empty());
        assert!(kind.calls().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_update_always_mutates() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);
        let spec = server_spec("web");

        let created = reconciler
            .reconcile(&spec, DesiredState::Present, true, WAIT)
            .await
            .unwrap();

        let mut update = server_spec("web");
        update.name = None;
        update.instance_ids = vec![created.resources[0].id.clone()];

        // Identical values still mutate under explicit update intent
        let outcome = reconciler
            .reconcile(&update, DesiredState::Update, true, WAIT)
            .await
            .unwrap();
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn test_update_of_unknown_resource_fails() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind, OperationStatus::Done);

        let mut spec = ResourceSpec::new("server");
        spec.instance_ids = vec!["ghost".to_string()];

        let err = reconciler
            .reconcile(&spec, DesiredState::Update, true, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rename_via_instance_ids() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        let created = reconciler
            .reconcile(&server_spec("old-name"), DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        let id = created.resources[0].id.clone();

        let mut rename = server_spec("new-name");
        rename.instance_ids = vec![id.clone()];
        let outcome = reconciler
            .reconcile(&rename, DesiredState::Update, true, WAIT)
            .await
            .unwrap();

        // Same resource, new name: an update, not a second create
        assert!(outcome.changed);
        assert_eq!(outcome.resources[0].id, id);
        assert_eq!(outcome.resources[0].name, "new-name");
        assert_eq!(kind.calls(), vec!["create old-name".to_string(), format!("update {id}")]);
    }

    #[tokio::test]
    async fn test_rename_rejects_multiple_targets() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind, OperationStatus::Done);

        let mut spec = server_spec("new-name");
        spec.instance_ids = vec!["a".to_string(), "b".to_string()];

        let err = reconciler
            .reconcile(&spec, DesiredState::Update, true, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_is_rejected() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        reconciler
            .reconcile(&server_spec("alpha"), DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        let beta = reconciler
            .reconcile(&server_spec("beta"), DesiredState::Present, true, WAIT)
            .await
            .unwrap();

        let mut rename = server_spec("alpha");
        rename.instance_ids = vec![beta.resources[0].id.clone()];
        let err = reconciler
            .reconcile(&rename, DesiredState::Update, true, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ambiguous_natural_key_is_fatal() {
        let kind = Arc::new(FakeKind::new("server"));
        kind.seed(Observed::new("id-a", "twin"));
        kind.seed(Observed::new("id-b", "twin"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        let err = reconciler
            .reconcile(&server_spec("twin"), DesiredState::Present, true, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Ambiguous { matches: 2, .. }));
        assert!(kind.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_template_and_ids_address_the_same_set() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        let mut spec = server_spec("web%02d");
        spec.count = 2;
        let created = reconciler
            .reconcile(&spec, DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        assert!(created.changed);
        let mut created_ids: Vec<String> =
            created.resources.iter().map(|r| r.id.clone()).collect();
        created_ids.sort();

        // Address by explicit ids
        let mut by_ids = ResourceSpec::new("server").with_attrs(json!({"cores": 8}));
        by_ids.instance_ids = created_ids.clone();
        let updated = reconciler
            .reconcile(&by_ids, DesiredState::Update, true, WAIT)
            .await
            .unwrap();
        let mut updated_ids: Vec<String> =
            updated.resources.iter().map(|r| r.id.clone()).collect();
        updated_ids.sort();
        assert_eq!(updated_ids, created_ids);

        // Address by re-expanding the same template
        let mut by_template = ResourceSpec::new("server").with_attrs(json!({"cores": 16}));
        by_template.name = Some("web%02d".to_string());
        by_template.count = 2;
        let again = reconciler
            .reconcile(&by_template, DesiredState::Update, true, WAIT)
            .await
            .unwrap();
        let mut template_ids: Vec<String> = again.resources.iter().map(|r| r.id.clone()).collect();
        template_ids.sort();
        assert_eq!(template_ids, created_ids);
    }

    #[tokio::test]
    async fn test_bulk_changed_aggregates_by_or() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        // One member already exists, one is missing
        kind.seed(
            Observed::new("id-existing", "web01")
                .with_state(LifecycleState::Available)
                .with_properties(json!({"cores": 2, "ram": 2048})),
        );

        let mut spec = server_spec("web%02d");
        spec.count = 2;
        let outcome = reconciler
            .reconcile(&spec, DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.resources.len(), 2);
        assert_eq!(outcome.summary.created, 1);
        assert_eq!(outcome.summary.unchanged, 1);
        assert_eq!(kind.calls(), vec!["create web02"]);
    }

    #[tokio::test]
    async fn test_power_transitions_are_idempotent() {
        let kind = Arc::new(
            FakeKind::new("server").with_initial_state(LifecycleState::Shutoff),
        );
        let reconciler = reconciler_for(kind.clone(), OperationStatus::Done);

        let created = reconciler
            .reconcile(&server_spec("web"), DesiredState::Present, true, WAIT)
            .await
            .unwrap();
        let id = created.resources[0].id.clone();

        let mut start = ResourceSpec::new("server");
        start.instance_ids = vec![id.clone()];

        let first = reconciler
            .reconcile(&start, DesiredState::Running, true, WAIT)
            .await
            .unwrap();
        assert!(first.changed);
        assert_eq!(first.resources[0].state, LifecycleState::Running);

        let second = reconciler
            .reconcile(&start, DesiredState::Running, true, WAIT)
            .await
            .unwrap();
        assert!(!second.changed);
        assert_eq!(
            kind.calls(),
            vec!["create web".to_string(), format!("power {id} running")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_is_surfaced() {
        let kind = Arc::new(FakeKind::new("server").with_async_ops());
        // The operation never completes
        let reconciler = reconciler_for(kind, OperationStatus::Running);

        let err = reconciler
            .reconcile(
                &server_spec("web"),
                DesiredState::Present,
                true,
                Duration::from_secs(30),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_operation_failure_is_surfaced() {
        let kind = Arc::new(FakeKind::new("server").with_async_ops());
        let reconciler = reconciler_for(kind, OperationStatus::Failed("quota exceeded".into()));

        let err = reconciler
            .reconcile(&server_spec("web"), DesiredState::Present, true, WAIT)
            .await
            .unwrap_err();
        match err {
            CloudError::OperationFailed { message, .. } => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_wait_returns_without_polling() {
        let kind = Arc::new(FakeKind::new("server").with_async_ops());
        // Would time out if polled
        let reconciler = reconciler_for(kind, OperationStatus::Running);

        let outcome = reconciler
            .reconcile(&server_spec("web"), DesiredState::Present, false, WAIT)
            .await
            .unwrap();
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn test_present_requires_a_name() {
        let kind = Arc::new(FakeKind::new("server"));
        let reconciler = reconciler_for(kind, OperationStatus::Done);

        let err = reconciler
            .reconcile(&ResourceSpec::new("server"), DesiredState::Present, true, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let kind = Arc::new(FakeKind::new("lan"));
        let reconciler = reconciler_for(kind, OperationStatus::Done);

        let err = reconciler
            .reconcile(&server_spec("web"), DesiredState::Present, true, WAIT)
            .await
            .unwrap_err();
        match err {
            CloudError::Validation(message) => {
                assert!(message.contains("server"));
                assert!(message.contains("supported: lan"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
