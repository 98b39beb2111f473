//! SQL schema and name validation.
//!
//! # Table structure
//!
//! - `volumes`: named volumes and their data directory
//! - `networks`: user-defined networks (built-ins are not stored)
//! - `images`: registered image references
//! - `containers`: recorded containers, with a JSON `config` column
//! - `container_mounts`: named volumes mounted by each container
//!
//! Every resource table is keyed by `(namespace, name)`.

use std::sync::LazyLock;

use boxctl_core::ResourceKind;
use regex::Regex;

use crate::error::{Result, StoreError};

/// Bumped whenever the table layout changes.
pub const SCHEMA_VERSION: i64 = 1;

/// Networks present in every namespace. They cannot be created or removed.
pub const BUILTIN_NETWORKS: &[&str] = &["bridge", "host", "none"];

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static regex must compile"));

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9._-]*(?::[0-9]+)?(?:/[a-z0-9][a-z0-9._-]*)*(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?(?:@sha256:[a-f0-9]{64})?$")
        .expect("static regex must compile")
});

/// Validates a namespace, volume, network or container name.
pub fn validate_name(kind: ResourceKind, name: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Validates an image reference and adds the `:latest` tag when it carries
/// neither a tag nor a digest.
///
/// # Examples
///
/// ```
/// use boxctl_store::normalize_reference;
///
/// assert_eq!(normalize_reference("alpine").unwrap(), "alpine:latest");
/// assert_eq!(normalize_reference("ghcr.io/org/app:1.2").unwrap(), "ghcr.io/org/app:1.2");
/// assert_eq!(normalize_reference("localhost:5000/app").unwrap(), "localhost:5000/app:latest");
/// assert!(normalize_reference("Alpine").is_err());
/// ```
pub fn normalize_reference(reference: &str) -> Result<String> {
    if !REFERENCE_RE.is_match(reference) {
        return Err(StoreError::InvalidReference(reference.to_string()));
    }
    let last = reference.rsplit('/').next().unwrap_or(reference);
    if last.contains(':') || reference.contains('@') {
        Ok(reference.to_string())
    } else {
        Ok(format!("{reference}:latest"))
    }
}

/// Generates the complete SQL schema.
pub fn generate_schema_sql() -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS volumes (
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    mountpoint TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (namespace, name)
);

CREATE TABLE IF NOT EXISTS networks (
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    id TEXT NOT NULL,
    driver TEXT NOT NULL DEFAULT 'bridge',
    subnet TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (namespace, name)
);

CREATE TABLE IF NOT EXISTS images (
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (namespace, name)
);

CREATE TABLE IF NOT EXISTS containers (
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    id TEXT NOT NULL UNIQUE,
    image TEXT NOT NULL,
    command TEXT NOT NULL DEFAULT '[]',
    network TEXT NOT NULL DEFAULT 'bridge',
    restart TEXT NOT NULL DEFAULT 'no',
    status TEXT NOT NULL,
    config TEXT NOT NULL DEFAULT '{{}}',
    created_at TEXT NOT NULL,
    PRIMARY KEY (namespace, name)
);

CREATE TABLE IF NOT EXISTS container_mounts (
    namespace TEXT NOT NULL,
    container TEXT NOT NULL,
    volume TEXT NOT NULL,
    target TEXT NOT NULL,
    FOREIGN KEY (namespace, container) REFERENCES containers(namespace, name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_containers_image ON containers(namespace, image);
CREATE INDEX IF NOT EXISTS idx_containers_network ON containers(namespace, network);
CREATE INDEX IF NOT EXISTS idx_container_mounts_volume ON container_mounts(namespace, volume);

PRAGMA user_version = {SCHEMA_VERSION};
"#
    )
}
