//! Record types and their row conversions.
//!
//! Records serialize to the JSON printed by `inspect` commands, so field
//! names follow the container tooling convention (`Name`, `CreatedAt`).

use chrono::{SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeRecord {
    pub name: String,
    pub namespace: String,
    /// Host directory holding the volume contents.
    pub mountpoint: String,
    pub created_at: String,
}

impl VolumeRecord {
    pub(crate) const COLUMNS: &'static str = "name, namespace, mountpoint, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            namespace: row.get(1)?,
            mountpoint: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// A network, built-in or user-defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkRecord {
    pub name: String,
    pub namespace: String,
    pub id: String,
    pub driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Built-in networks cannot be removed.
    pub protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl NetworkRecord {
    pub(crate) const COLUMNS: &'static str = "name, namespace, id, driver, subnet, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            namespace: row.get(1)?,
            id: row.get(2)?,
            driver: row.get(3)?,
            subnet: row.get(4)?,
            protected: false,
            created_at: Some(row.get(5)?),
        })
    }

    /// The record reported for a built-in network.
    pub(crate) fn builtin(namespace: &str, name: &str) -> Self {
        let driver = match name {
            "host" => "host",
            "none" => "null",
            _ => "bridge",
        };
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            id: digest(&[name]),
            driver: driver.to_string(),
            subnet: (name == "bridge").then(|| "10.4.0.0/24".to_string()),
            protected: true,
            created_at: None,
        }
    }
}

/// A registered image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageRecord {
    /// Normalized reference, e.g. `alpine:latest`.
    pub name: String,
    pub namespace: String,
    pub id: String,
    pub created_at: String,
}

impl ImageRecord {
    pub(crate) const COLUMNS: &'static str = "name, namespace, id, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            namespace: row.get(1)?,
            id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// Recorded lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Exited,
}

impl ContainerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Exited => "exited",
        }
    }

    fn parse(s: &str) -> Self {
        if s == "running" { Self::Running } else { Self::Exited }
    }
}

/// A named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mount {
    pub volume: String,
    pub target: String,
}

/// Runtime options stored as JSON alongside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ContainerConfig {
    pub interactive: bool,
    pub tty: bool,
    pub auto_remove: bool,
    pub env: Vec<String>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    /// Bind mounts (`/host:/target`), which are not tracked as volumes.
    pub binds: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgroupns: Option<String>,
    pub snapshotter: String,
    pub cgroup_manager: String,
}

/// A recorded container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub command: Vec<String>,
    pub network: String,
    pub restart: String,
    pub status: ContainerStatus,
    pub mounts: Vec<Mount>,
    pub config: ContainerConfig,
    pub created_at: String,
}

impl ContainerRecord {
    pub(crate) const COLUMNS: &'static str =
        "id, name, namespace, image, command, network, restart, status, config, created_at";

    /// Builds a record from a row. JSON columns are decoded, mounts are
    /// filled in separately.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let command: String = row.get(4)?;
        let status: String = row.get(7)?;
        let config: String = row.get(8)?;
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            namespace: row.get(2)?,
            image: row.get(3)?,
            command: decode_json(4, &command)?,
            network: row.get(5)?,
            restart: row.get(6)?,
            status: ContainerStatus::parse(&status),
            mounts: Vec::new(),
            config: decode_json(8, &config)?,
            created_at: row.get(9)?,
        })
    }
}

/// Parameters of a container to record.
#[derive(Debug, Clone, Default)]
pub struct NewContainer {
    /// Generated from the image and ID when absent.
    pub name: Option<String>,
    pub image: String,
    pub command: Vec<String>,
    /// Defaults to `bridge`.
    pub network: Option<String>,
    /// Defaults to `no`.
    pub restart: Option<String>,
    pub detach: bool,
    /// Volume specs as typed: `name:/target` or `/host:/target`.
    pub volumes: Vec<String>,
    pub config: ContainerConfig,
}

fn decode_json<T: serde::de::DeserializeOwned>(column: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Current time as an RFC 3339 timestamp.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Hex SHA-256 of the parts, separated by NUL bytes.
pub(crate) fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// An ID unique to this call: the digest of `parts` plus the current time.
pub(crate) fn unique_id(parts: &[&str]) -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .to_string();
    let mut all = parts.to_vec();
    all.push(nanos.as_str());
    digest(&all)
}
