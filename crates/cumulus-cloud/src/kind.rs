//! Per-resource-kind capability trait and registry

use crate::error::{CloudError, Result};
use crate::model::{LifecycleState, Observed, ResourceSpec};
use crate::poll::OperationHandle;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Target power state for kinds that support lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Running,
    Stopped,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::Running => write!(f, "running"),
            PowerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// A mutating call that has been accepted by the provider
#[derive(Debug, Clone)]
pub struct Mutation {
    /// Provider's representation of the resource after the call
    pub resource: Observed,

    /// Handle for the in-flight asynchronous operation, if any
    pub handle: Option<OperationHandle>,
}

impl Mutation {
    pub fn done(resource: Observed) -> Self {
        Self {
            resource,
            handle: None,
        }
    }

    pub fn pending(resource: Observed, handle: OperationHandle) -> Self {
        Self {
            resource,
            handle: Some(handle),
        }
    }
}

/// Capability implemented once per resource kind
///
/// The reconciler dispatches every create/update/delete through this
/// trait; only identity listing and the field comparison differ between
/// kinds, the reconciliation shape itself is shared.
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Kind name used as the registry key (e.g. "server")
    fn kind(&self) -> &str;

    /// Fetch all resources of this kind within the spec's parent scope
    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<Observed>>;

    /// Whether the declared mutable fields differ from the observed
    /// resource. Undeclared fields never force an update.
    fn diff(&self, spec: &ResourceSpec, observed: &Observed) -> Result<bool>;

    /// Create a resource under `name` (the enumerated member name)
    async fn create(&self, spec: &ResourceSpec, name: &str) -> Result<Mutation>;

    /// Update an existing resource to match the declared fields
    async fn update(&self, spec: &ResourceSpec, observed: &Observed) -> Result<Mutation>;

    /// Delete an existing resource
    async fn delete(&self, spec: &ResourceSpec, observed: &Observed)
    -> Result<Option<OperationHandle>>;

    /// Issue a power transition. Kinds without a power lifecycle keep
    /// the default, which rejects the request before any network call.
    async fn power(
        &self,
        spec: &ResourceSpec,
        observed: &Observed,
        target: PowerState,
    ) -> Result<Mutation> {
        let _ = (spec, observed, target);
        Err(CloudError::Validation(format!(
            "{} resources do not support power transitions",
            self.kind()
        )))
    }

    /// Current power state, for running/stopped comparison
    fn power_state(&self, observed: &Observed) -> Option<PowerState> {
        match observed.state {
            LifecycleState::Running => Some(PowerState::Running),
            LifecycleState::Shutoff | LifecycleState::Inactive => Some(PowerState::Stopped),
            _ => None,
        }
    }
}

/// Registry of kind handlers, keyed by kind name
#[derive(Default, Clone)]
pub struct Registry {
    kinds: HashMap<String, Arc<dyn ResourceKind>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ResourceKind>) {
        self.kinds.insert(handler.kind().to_string(), handler);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn ResourceKind>> {
        self.kinds.get(kind).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.kinds().collect();
            known.sort_unstable();
            CloudError::Validation(format!(
                "unsupported resource kind: {kind} (supported: {})",
                known.join(", ")
            ))
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}
