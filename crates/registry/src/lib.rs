//! Permissioned name registry
//!
//! A versioned, resource-scoped registry: names map to expiring ownership
//! records, each governed by a role bitmap scoped to the record's current ACL
//! epoch. Re-registering an expired name opens a fresh epoch, so every role
//! granted before is orphaned without being enumerated.

pub mod config;
pub mod errors;
pub mod events;
pub mod observer;
pub mod registry;

pub use config::{LabelConfig, LoggingConfig, RegistryConfig, StorageConfig};
pub use errors::*;
pub use events::RegistryEvent;
pub use observer::{ObserverError, RenewalObserver};
pub use registry::{NameStatus, PermissionedRegistry, RegisterRequest};
