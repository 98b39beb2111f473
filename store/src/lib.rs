//! SQLite state store for boxctl.
//!
//! Volumes, networks, images and containers are recorded per namespace in
//! `<data-root>/state.db`. The store implements the
//! [`ResourceStore`](boxctl_core::ResourceStore) contract from
//! `boxctl-core`, so resource commands and shell completion share the same
//! name listings.
//!
//! # Architecture
//!
//! - **`schema`**: table definitions, built-in networks, name validation
//! - **`migration`**: idempotent table creation and status
//! - **`records`**: record types and row conversion
//! - **`query`**: read queries shared by both store types
//! - **`state`**: [`StateStore`] (read-write) and [`StoreReader`]
//!   (read-only, for completion)
//!
//! # Quick start
//!
//! ```no_run
//! use boxctl_core::{RemoveOptions, ResourceKind, ResourceStore};
//! use boxctl_store::StateStore;
//!
//! let store = StateStore::open("/var/lib/boxctl", "default").unwrap();
//! store.create_network("backend", "bridge", None).unwrap();
//!
//! let names = vec!["backend".to_string(), "bridge".to_string()];
//! let result = store.remove(ResourceKind::Network, &names, RemoveOptions::default());
//! for name in &result.removed {
//!     println!("{name}");
//! }
//! if let Some(err) = result.into_error(ResourceKind::Network) {
//!     eprintln!("error: {err}");
//! }
//! ```

mod error;
mod migration;
mod query;
mod records;
mod schema;
mod state;

pub use error::{Result, StoreError};
pub use migration::{Migration, MigrationStatus};
pub use records::{
    ContainerConfig, ContainerRecord, ContainerStatus, ImageRecord, Mount, NetworkRecord,
    NewContainer, VolumeRecord,
};
pub use schema::{
    BUILTIN_NETWORKS, DEFAULT_NAMESPACE, SCHEMA_VERSION, normalize_reference, validate_name,
};
pub use state::{STATE_DB, StateStore, StoreReader};
