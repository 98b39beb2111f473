//! Resource enumeration and best-effort removal.
//!
//! Backing stores (volumes, networks, images, containers) are external to
//! this crate. They are reached only through two traits:
//!
//! - [`ResourceEnumerator`] lists the names a store knows about. It is what
//!   completion providers and `ls` commands share.
//! - [`ResourceStore`] adds per-name removal. The provided
//!   [`remove`](ResourceStore::remove) method attempts every name
//!   independently and collects the outcome in a [`RemovalResult`]; one
//!   failing name never stops the others.
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//!
//! use boxctl_core::*;
//!
//! struct Names(RefCell<Vec<String>>);
//!
//! impl ResourceEnumerator for Names {
//!     fn enumerate(&self, _kind: ResourceKind) -> Result<Vec<ResourceEntry>, EnumerationError> {
//!         Ok(self.0.borrow().iter().map(|n| ResourceEntry::new(n.as_str())).collect())
//!     }
//! }
//!
//! impl ResourceStore for Names {
//!     fn remove_one(&self, _kind: ResourceKind, name: &str, _opts: RemoveOptions) -> Result<(), RemovalError> {
//!         let mut names = self.0.borrow_mut();
//!         let idx = names.iter().position(|n| n == name).ok_or(RemovalError::NotFound)?;
//!         names.remove(idx);
//!         Ok(())
//!     }
//! }
//!
//! let store = Names(RefCell::new(vec!["a".into(), "c".into()]));
//! let names = ["a", "b", "c"].map(String::from);
//! let result = store.remove(ResourceKind::Volume, &names, RemoveOptions::default());
//! assert_eq!(result.removed, vec!["a", "c"]);
//! assert_eq!(result.failure("b"), Some(&RemovalError::NotFound));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Kinds of named resources managed by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Namespace,
    Volume,
    Network,
    Image,
    Container,
}

impl ResourceKind {
    /// Lower-case noun used in messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Volume => "volume",
            Self::Network => "network",
            Self::Image => "image",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// One name reported by a store listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    /// Protected entries cannot be removed (for example built-in networks).
    pub protected: bool,
}

impl ResourceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protected: false,
        }
    }

    pub fn protected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protected: true,
        }
    }
}

/// The store could not be queried. Completion treats this as "no
/// candidates".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} enumeration unavailable: {reason}")]
pub struct EnumerationError {
    pub kind: ResourceKind,
    pub reason: String,
}

impl EnumerationError {
    pub fn new(kind: ResourceKind, reason: impl fmt::Display) -> Self {
        Self {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Why a single name could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemovalError {
    /// No resource with that name exists (anymore).
    #[error("not found")]
    NotFound,
    /// The resource is referenced by something else.
    #[error("in use: {0}")]
    Busy(String),
    /// The resource is protected or the filesystem refused the deletion.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The store itself failed while handling this name.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Options applied to every name of a removal batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Skip the in-use check where the store supports it.
    pub force: bool,
}

/// Outcome of a best-effort removal batch.
///
/// `removed` keeps the order in which removals succeeded. `failures` keeps
/// attempt order too, so a name given twice may appear in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalResult {
    pub removed: Vec<String>,
    pub failures: Vec<(String, RemovalError)>,
}

impl RemovalResult {
    /// Returns `true` when every attempted name was removed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the first recorded failure for `name`.
    pub fn failure(&self, name: &str) -> Option<&RemovalError> {
        self.failures
            .iter()
            .find(|(failed, _)| failed == name)
            .map(|(_, err)| err)
    }

    /// Converts the failures into the command's terminal error, if any.
    pub fn into_error(self, kind: ResourceKind) -> Option<PartialRemoval> {
        if self.failures.is_empty() {
            None
        } else {
            Some(PartialRemoval {
                kind,
                failures: self.failures,
            })
        }
    }
}

/// Aggregated failure of a removal batch, reported once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to remove {} {kind}(s): {}", .failures.len(), summarize(.failures))]
pub struct PartialRemoval {
    pub kind: ResourceKind,
    pub failures: Vec<(String, RemovalError)>,
}

fn summarize(failures: &[(String, RemovalError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("\"{name}\": {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Read access to a store's names.
pub trait ResourceEnumerator {
    /// Lists every `kind` entry in store order.
    fn enumerate(&self, kind: ResourceKind) -> Result<Vec<ResourceEntry>, EnumerationError>;
}

/// A store whose entries can be removed by name.
pub trait ResourceStore: ResourceEnumerator {
    /// Removes a single entry.
    fn remove_one(
        &self,
        kind: ResourceKind,
        name: &str,
        options: RemoveOptions,
    ) -> Result<(), RemovalError>;

    /// Removes each of `names` independently.
    ///
    /// There is no lock across the batch: each attempt observes whatever
    /// state the store is in at that moment, and an interrupted batch leaves
    /// earlier removals in place.
    fn remove(&self, kind: ResourceKind, names: &[String], options: RemoveOptions) -> RemovalResult {
        let mut result = RemovalResult::default();
        for name in names {
            match self.remove_one(kind, name, options) {
                Ok(()) => {
                    debug!(%kind, %name, "removed");
                    result.removed.push(name.clone());
                }
                Err(err) => {
                    debug!(%kind, %name, %err, "removal failed");
                    result.failures.push((name.clone(), err));
                }
            }
        }
        result
    }
}
