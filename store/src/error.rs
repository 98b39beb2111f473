//! Error types for state store operations.
//!
//! Per-name removal failures are not represented here; they are
//! [`RemovalError`](boxctl_core::RemovalError)s collected into a
//! [`RemovalResult`](boxctl_core::RemovalResult).

use boxctl_core::ResourceKind;
use thiserror::Error;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Filesystem failure (data root, volume directories).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON column encoding or decoding failure.
    #[error("conversion error: {0}")]
    ConversionError(#[from] serde_json::Error),

    /// A namespace, volume, network or container name is malformed.
    #[error("invalid {kind} name {name:?}: must match [A-Za-z0-9][A-Za-z0-9_.-]*")]
    InvalidName { kind: ResourceKind, name: String },

    /// An image reference is malformed.
    #[error("invalid image reference {0:?}")]
    InvalidReference(String),

    /// Creation would overwrite an existing resource.
    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// The named resource does not exist.
    #[error("no such {kind}: {name}")]
    NotFound { kind: ResourceKind, name: String },

    /// The name belongs to a built-in resource.
    #[error("{kind} {name:?} is built in")]
    Protected { kind: ResourceKind, name: String },
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
