//! Cumulus Cloud Reconciler
//!
//! This crate provides the provider-independent core for Cumulus:
//! a reconciling resource operator that maps a declared resource
//! specification onto the minimal mutating action against a cloud
//! provider's inventory, plus the polling machinery for the provider's
//! asynchronous operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Cumulus CLI                     │
//! │              (cumulus apply/destroy)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               cumulus-cloud                      │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │             Reconciler                    │   │
//! │  │  resolve → diff → mutate → await          │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Kind Registry│  │ Op. Poller   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ cumulus-cloud-│
//! │     ionos     │
//! └───────────────┘
//! ```

pub mod error;
pub mod kind;
pub mod model;
pub mod poll;
pub mod reconcile;
pub mod relations;
pub mod template;

// Re-exports
pub use error::{CloudError, Result};
pub use kind::{Mutation, PowerState, Registry, ResourceKind};
pub use model::{
    ChangeSummary, DesiredState, LifecycleState, Observed, ReconcileOutcome, ResourceSpec,
    find_unique,
};
pub use poll::{
    OperationHandle, OperationSource, OperationStatus, PollConfig, PollOutcome, await_completion,
};
pub use reconcile::Reconciler;
pub use relations::{SetDelta, set_delta};
pub use template::expand_names;
