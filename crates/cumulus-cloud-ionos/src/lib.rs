//! IONOS Cloud provider for Cumulus
//!
//! Implements the `cumulus-cloud` resource-kind capability against the
//! IONOS Cloud v6 REST API (plus the DBaaS Postgres API family):
//! datacenters, servers, volumes, LANs, NICs, IP blocks, users, groups,
//! private cross-connects and managed Postgres clusters.
//!
//! Mutations are accepted asynchronously by the provider and tracked
//! through request ids extracted from the `Location` response header;
//! the client implements `OperationSource` so the reconciler can poll
//! them to completion.

pub mod client;
pub mod error;
pub mod kinds;
pub mod types;

pub use client::{Credentials, IonosClient};
pub use error::{IonosError, Result};
pub use kinds::registry;
