//! Dynamic inventory support
//!
//! Configuration with environment fallbacks, a freshness-checked cache
//! file, and the grouping logic that turns fetched servers into an
//! inventory document.

pub mod cache;
pub mod config;
pub mod error;
pub mod groups;

pub use cache::InventoryCache;
pub use config::{InventoryConfig, InventoryCredentials};
pub use error::{InventoryError, Result};
pub use groups::{Group, HostRecord, Inventory, build_inventory};
