//! Read queries shared by the read-write and read-only stores.

use boxctl_core::{ResourceEntry, ResourceKind};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::Result;
use crate::records::{ContainerRecord, ImageRecord, Mount, NetworkRecord, VolumeRecord};
use crate::schema::{BUILTIN_NETWORKS, DEFAULT_NAMESPACE};

/// Table backing a namespaced resource kind.
pub(crate) fn table(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::Volume => Some("volumes"),
        ResourceKind::Network => Some("networks"),
        ResourceKind::Image => Some("images"),
        ResourceKind::Container => Some("containers"),
        ResourceKind::Namespace => None,
    }
}

/// Names of `kind` in `namespace`, sorted.
pub(crate) fn list_names(conn: &Connection, kind: ResourceKind, namespace: &str) -> Result<Vec<String>> {
    let Some(table) = table(kind) else {
        return namespaces(conn);
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT name FROM {table} WHERE namespace = ?1 ORDER BY name"
    ))?;
    let names = stmt
        .query_map([namespace], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Every namespace that owns a resource, plus the default one, sorted.
pub(crate) fn namespaces(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT namespace FROM volumes
         UNION SELECT namespace FROM networks
         UNION SELECT namespace FROM images
         UNION SELECT namespace FROM containers
         UNION SELECT ?1
         ORDER BY 1",
    )?;
    let names = stmt
        .query_map([DEFAULT_NAMESPACE], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Enumeration entries for completion and listings.
///
/// `conn` is `None` when no state database exists yet; built-in networks
/// and the default namespace are still reported.
pub(crate) fn enumerate(
    conn: Option<&Connection>,
    kind: ResourceKind,
    namespace: &str,
) -> Result<Vec<ResourceEntry>> {
    let mut entries = Vec::new();
    if kind == ResourceKind::Network {
        entries.extend(BUILTIN_NETWORKS.iter().map(|name| ResourceEntry::protected(*name)));
    }

    match conn {
        Some(conn) => {
            entries.extend(list_names(conn, kind, namespace)?.into_iter().map(ResourceEntry::new));
        }
        None if kind == ResourceKind::Namespace => {
            entries.push(ResourceEntry::new(DEFAULT_NAMESPACE));
        }
        None => {}
    }

    debug!(%kind, namespace, count = entries.len(), "enumerated");
    Ok(entries)
}

pub(crate) fn get_volume(conn: &Connection, namespace: &str, name: &str) -> Result<Option<VolumeRecord>> {
    let sql = format!(
        "SELECT {} FROM volumes WHERE namespace = ?1 AND name = ?2",
        VolumeRecord::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![namespace, name], VolumeRecord::from_row)
        .optional()?)
}

pub(crate) fn list_volumes(conn: &Connection, namespace: &str) -> Result<Vec<VolumeRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM volumes WHERE namespace = ?1 ORDER BY name",
        VolumeRecord::COLUMNS
    ))?;
    let rows = stmt
        .query_map([namespace], VolumeRecord::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn get_network(conn: &Connection, namespace: &str, name: &str) -> Result<Option<NetworkRecord>> {
    if BUILTIN_NETWORKS.contains(&name) {
        return Ok(Some(NetworkRecord::builtin(namespace, name)));
    }
    let sql = format!(
        "SELECT {} FROM networks WHERE namespace = ?1 AND name = ?2",
        NetworkRecord::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![namespace, name], NetworkRecord::from_row)
        .optional()?)
}

/// Built-in networks first, then user-defined ones by name.
pub(crate) fn list_networks(conn: &Connection, namespace: &str) -> Result<Vec<NetworkRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM networks WHERE namespace = ?1 ORDER BY name",
        NetworkRecord::COLUMNS
    ))?;
    let mut networks: Vec<NetworkRecord> = BUILTIN_NETWORKS
        .iter()
        .map(|name| NetworkRecord::builtin(namespace, name))
        .collect();
    for row in stmt.query_map([namespace], NetworkRecord::from_row)? {
        networks.push(row?);
    }
    Ok(networks)
}

/// Looks an image up by normalized reference or by ID prefix.
pub(crate) fn get_image(conn: &Connection, namespace: &str, reference: &str) -> Result<Option<ImageRecord>> {
    let sql = format!(
        "SELECT {} FROM images WHERE namespace = ?1 AND (name = ?2 OR name = ?2 || ':latest')",
        ImageRecord::COLUMNS
    );
    if let Some(image) = conn
        .query_row(&sql, params![namespace, reference], ImageRecord::from_row)
        .optional()?
    {
        return Ok(Some(image));
    }

    let hex = reference.strip_prefix("sha256:").unwrap_or(reference);
    if hex.len() < 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(None);
    }
    // Stored IDs carry the `sha256:` prefix; match on the hex after it.
    let sql = format!(
        "SELECT {} FROM images WHERE namespace = ?1 AND substr(id, 8, ?3) = ?2",
        ImageRecord::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let matches = stmt
        .query_map(params![namespace, hex, hex.len() as i64], ImageRecord::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(unique(matches))
}

pub(crate) fn list_images(conn: &Connection, namespace: &str) -> Result<Vec<ImageRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM images WHERE namespace = ?1 ORDER BY name",
        ImageRecord::COLUMNS
    ))?;
    let rows = stmt
        .query_map([namespace], ImageRecord::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Looks a container up by name, then by unique ID prefix.
pub(crate) fn get_container(conn: &Connection, namespace: &str, key: &str) -> Result<Option<ContainerRecord>> {
    let sql = format!(
        "SELECT {} FROM containers WHERE namespace = ?1 AND name = ?2",
        ContainerRecord::COLUMNS
    );
    let found = conn
        .query_row(&sql, params![namespace, key], ContainerRecord::from_row)
        .optional()?;

    let found = match found {
        Some(container) => Some(container),
        None if !key.is_empty() && key.chars().all(|c| c.is_ascii_hexdigit()) => {
            let sql = format!(
                "SELECT {} FROM containers WHERE namespace = ?1 AND substr(id, 1, ?3) = ?2",
                ContainerRecord::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let matches = stmt
                .query_map(params![namespace, key, key.len() as i64], ContainerRecord::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            unique(matches)
        }
        None => None,
    };

    match found {
        Some(mut container) => {
            container.mounts = mounts(conn, namespace, &container.name)?;
            Ok(Some(container))
        }
        None => Ok(None),
    }
}

/// Containers in creation order.
pub(crate) fn list_containers(conn: &Connection, namespace: &str) -> Result<Vec<ContainerRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM containers WHERE namespace = ?1 ORDER BY created_at, name",
        ContainerRecord::COLUMNS
    ))?;
    let mut containers = stmt
        .query_map([namespace], ContainerRecord::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for container in &mut containers {
        container.mounts = mounts(conn, namespace, &container.name)?;
    }
    Ok(containers)
}

fn mounts(conn: &Connection, namespace: &str, container: &str) -> Result<Vec<Mount>> {
    let mut stmt = conn.prepare(
        "SELECT volume, target FROM container_mounts WHERE namespace = ?1 AND container = ?2 ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map(params![namespace, container], |row| {
            Ok(Mount {
                volume: row.get(0)?,
                target: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Name of a container in `namespace` that references the resource, if any.
pub(crate) fn user_of(
    conn: &Connection,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
) -> Result<Option<String>> {
    let sql = match kind {
        ResourceKind::Volume => {
            "SELECT container FROM container_mounts WHERE namespace = ?1 AND volume = ?2 LIMIT 1"
        }
        ResourceKind::Network => {
            "SELECT name FROM containers WHERE namespace = ?1 AND network = ?2 LIMIT 1"
        }
        ResourceKind::Image => {
            "SELECT name FROM containers WHERE namespace = ?1 AND image = ?2 LIMIT 1"
        }
        ResourceKind::Container | ResourceKind::Namespace => return Ok(None),
    };
    Ok(conn
        .query_row(sql, params![namespace, name], |row| row.get(0))
        .optional()?)
}

fn unique<T>(mut matches: Vec<T>) -> Option<T> {
    if matches.len() == 1 { matches.pop() } else { None }
}
