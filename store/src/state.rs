//! The persistent state store.
//!
//! [`StateStore`] opens `<data-root>/state.db` read-write, creating it and
//! its tables on first use. It is what resource commands mutate through.
//! [`StoreReader`] is the read-only counterpart used while completing: it
//! never creates files, connects on first use, and treats a missing
//! database as an empty one.
//!
//! Both are scoped to one namespace. Every call is independent; no
//! transaction spans a removal batch.

use std::cell::OnceCell;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use boxctl_core::{
    EnumerationError, RemovalError, RemoveOptions, ResourceEntry, ResourceEnumerator,
    ResourceKind, ResourceStore,
};
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::migration::Migration;
use crate::query;
use crate::records::{
    ContainerRecord, ContainerStatus, ImageRecord, NetworkRecord, NewContainer, VolumeRecord,
    digest, now, unique_id,
};
use crate::schema::{BUILTIN_NETWORKS, normalize_reference, validate_name};

/// File name of the state database inside the data root.
pub const STATE_DB: &str = "state.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-write access to one namespace of the state database.
///
/// # Examples
///
/// ```no_run
/// use boxctl_core::{RemoveOptions, ResourceKind, ResourceStore};
/// use boxctl_store::StateStore;
///
/// let store = StateStore::open("/var/lib/boxctl", "default").unwrap();
/// store.create_volume(Some("data")).unwrap();
///
/// let result = store.remove(ResourceKind::Volume, &["data".to_string()], RemoveOptions::default());
/// assert_eq!(result.removed, vec!["data"]);
/// ```
pub struct StateStore {
    conn: Connection,
    data_root: PathBuf,
    namespace: String,
}

impl StateStore {
    /// Opens (and if needed creates) the state database under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] for a malformed namespace,
    /// [`StoreError::IoError`] if the data root cannot be created, or
    /// [`StoreError::DatabaseError`] if the database cannot be opened or
    /// migrated.
    pub fn open(data_root: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        validate_name(ResourceKind::Namespace, namespace)?;
        let data_root = data_root.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_root)?;

        let conn = Connection::open(data_root.join(STATE_DB))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Migration::new(&conn)?.up()?;
        debug!(data_root = %data_root.display(), namespace, "opened state store");

        Ok(Self {
            conn,
            data_root,
            namespace: namespace.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Directory holding the contents of volume `name`.
    pub fn volume_dir(&self, name: &str) -> PathBuf {
        self.data_root
            .join("volumes")
            .join(&self.namespace)
            .join(name)
    }

    /// Creates a volume and its data directory.
    ///
    /// Without a name, a 64-character hex name is generated.
    pub fn create_volume(&self, name: Option<&str>) -> Result<VolumeRecord> {
        let name = match name {
            Some(name) => name.to_string(),
            None => unique_id(&[&self.namespace, "volume"]),
        };
        validate_name(ResourceKind::Volume, &name)?;
        if query::get_volume(&self.conn, &self.namespace, &name)?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: ResourceKind::Volume,
                name,
            });
        }

        let data = self.volume_dir(&name).join("_data");
        std::fs::create_dir_all(&data)?;
        let record = VolumeRecord {
            name,
            namespace: self.namespace.clone(),
            mountpoint: data.display().to_string(),
            created_at: now(),
        };
        self.conn.execute(
            "INSERT INTO volumes (namespace, name, mountpoint, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![record.namespace, record.name, record.mountpoint, record.created_at],
        )?;
        info!(volume = %record.name, namespace = %self.namespace, "created volume");
        Ok(record)
    }

    pub fn volume(&self, name: &str) -> Result<Option<VolumeRecord>> {
        query::get_volume(&self.conn, &self.namespace, name)
    }

    pub fn volumes(&self) -> Result<Vec<VolumeRecord>> {
        query::list_volumes(&self.conn, &self.namespace)
    }

    /// Creates a user-defined network.
    pub fn create_network(&self, name: &str, driver: &str, subnet: Option<&str>) -> Result<NetworkRecord> {
        validate_name(ResourceKind::Network, name)?;
        if BUILTIN_NETWORKS.contains(&name) {
            return Err(StoreError::Protected {
                kind: ResourceKind::Network,
                name: name.to_string(),
            });
        }
        if query::get_network(&self.conn, &self.namespace, name)?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: ResourceKind::Network,
                name: name.to_string(),
            });
        }

        let record = NetworkRecord {
            name: name.to_string(),
            namespace: self.namespace.clone(),
            id: unique_id(&[&self.namespace, "network", name]),
            driver: driver.to_string(),
            subnet: subnet.map(str::to_string),
            protected: false,
            created_at: Some(now()),
        };
        self.conn.execute(
            "INSERT INTO networks (namespace, name, id, driver, subnet, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.namespace,
                record.name,
                record.id,
                record.driver,
                record.subnet,
                record.created_at
            ],
        )?;
        info!(network = %record.name, namespace = %self.namespace, "created network");
        Ok(record)
    }

    pub fn network(&self, name: &str) -> Result<Option<NetworkRecord>> {
        query::get_network(&self.conn, &self.namespace, name)
    }

    pub fn networks(&self) -> Result<Vec<NetworkRecord>> {
        query::list_networks(&self.conn, &self.namespace)
    }

    /// Registers an image reference. Registering a known reference returns
    /// the existing record.
    pub fn register_image(&self, reference: &str) -> Result<ImageRecord> {
        let name = normalize_reference(reference)?;
        if let Some(existing) = query::get_image(&self.conn, &self.namespace, &name)? {
            return Ok(existing);
        }

        let record = ImageRecord {
            id: format!("sha256:{}", digest(&[&name])),
            name,
            namespace: self.namespace.clone(),
            created_at: now(),
        };
        self.conn.execute(
            "INSERT INTO images (namespace, name, id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![record.namespace, record.name, record.id, record.created_at],
        )?;
        info!(image = %record.name, namespace = %self.namespace, "registered image");
        Ok(record)
    }

    pub fn image(&self, reference: &str) -> Result<Option<ImageRecord>> {
        query::get_image(&self.conn, &self.namespace, reference)
    }

    pub fn images(&self) -> Result<Vec<ImageRecord>> {
        query::list_images(&self.conn, &self.namespace)
    }

    /// Records a container.
    ///
    /// The image must already be registered and the network must exist.
    /// Named volumes in `volumes` are created when missing, like a runtime
    /// would on first mount.
    pub fn create_container(&self, spec: NewContainer) -> Result<ContainerRecord> {
        let image = self
            .image(&spec.image)?
            .ok_or_else(|| StoreError::NotFound {
                kind: ResourceKind::Image,
                name: spec.image.clone(),
            })?;
        let network = spec.network.unwrap_or_else(|| "bridge".to_string());
        if self.network(&network)?.is_none() {
            return Err(StoreError::NotFound {
                kind: ResourceKind::Network,
                name: network,
            });
        }

        let id = unique_id(&[&self.namespace, "container", &image.name]);
        let name = match spec.name {
            Some(name) => name,
            None => format!("{}-{}", image_basename(&image.name), &id[..5]),
        };
        validate_name(ResourceKind::Container, &name)?;
        if query::get_container(&self.conn, &self.namespace, &name)?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: ResourceKind::Container,
                name,
            });
        }

        let mut config = spec.config;
        let mut mounts = Vec::new();
        for volume in &spec.volumes {
            match volume.split_once(':') {
                Some((source, target)) if !source.starts_with('/') && !source.starts_with('.') => {
                    if self.volume(source)?.is_none() {
                        self.create_volume(Some(source))?;
                    }
                    mounts.push((source.to_string(), target.to_string()));
                }
                _ => config.binds.push(volume.clone()),
            }
        }

        let status = if spec.detach {
            ContainerStatus::Running
        } else {
            ContainerStatus::Exited
        };
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO containers (namespace, name, id, image, command, network, restart, status, config, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.namespace,
                name,
                id,
                image.name,
                serde_json::to_string(&spec.command)?,
                network,
                spec.restart.as_deref().unwrap_or("no"),
                status.as_str(),
                serde_json::to_string(&config)?,
                now()
            ],
        )?;
        for (volume, target) in &mounts {
            tx.execute(
                "INSERT INTO container_mounts (namespace, container, volume, target) VALUES (?1, ?2, ?3, ?4)",
                params![self.namespace, name, volume, target],
            )?;
        }
        tx.commit()?;
        info!(container = %name, image = %image.name, "created container");

        query::get_container(&self.conn, &self.namespace, &id)?.ok_or(StoreError::NotFound {
            kind: ResourceKind::Container,
            name,
        })
    }

    pub fn container(&self, key: &str) -> Result<Option<ContainerRecord>> {
        query::get_container(&self.conn, &self.namespace, key)
    }

    pub fn containers(&self) -> Result<Vec<ContainerRecord>> {
        query::list_containers(&self.conn, &self.namespace)
    }

    fn ensure_unused(&self, kind: ResourceKind, name: &str, options: RemoveOptions) -> std::result::Result<(), RemovalError> {
        if options.force {
            return Ok(());
        }
        match query::user_of(&self.conn, kind, &self.namespace, name) {
            Ok(Some(container)) => Err(RemovalError::Busy(format!("used by container {container}"))),
            Ok(None) => Ok(()),
            Err(err) => Err(unavailable(err)),
        }
    }

    fn delete_row(&self, kind: ResourceKind, name: &str) -> std::result::Result<(), RemovalError> {
        let Some(table) = query::table(kind) else {
            return Err(RemovalError::PermissionDenied(format!("{kind}s cannot be removed")));
        };
        let deleted = self
            .conn
            .execute(
                &format!("DELETE FROM {table} WHERE namespace = ?1 AND name = ?2"),
                params![self.namespace, name],
            )
            .map_err(|e| unavailable(e.into()))?;
        if deleted == 0 {
            Err(RemovalError::NotFound)
        } else {
            Ok(())
        }
    }

    fn remove_volume(&self, name: &str, options: RemoveOptions) -> std::result::Result<(), RemovalError> {
        if self.volume(name).map_err(unavailable)?.is_none() {
            return Err(RemovalError::NotFound);
        }
        self.ensure_unused(ResourceKind::Volume, name, options)?;

        match std::fs::remove_dir_all(self.volume_dir(name)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(RemovalError::PermissionDenied(err.to_string()));
            }
            Err(err) => return Err(unavailable(err.into())),
        }
        self.delete_row(ResourceKind::Volume, name)
    }

    fn remove_network(&self, name: &str) -> std::result::Result<(), RemovalError> {
        if BUILTIN_NETWORKS.contains(&name) {
            return Err(RemovalError::PermissionDenied(format!(
                "{name} is a built-in network"
            )));
        }
        if self.network(name).map_err(unavailable)?.is_none() {
            return Err(RemovalError::NotFound);
        }
        // Containers must be removed first; there is no force for networks.
        self.ensure_unused(ResourceKind::Network, name, RemoveOptions::default())?;
        self.delete_row(ResourceKind::Network, name)
    }

    fn remove_image(&self, reference: &str, options: RemoveOptions) -> std::result::Result<(), RemovalError> {
        let image = self
            .image(reference)
            .map_err(unavailable)?
            .ok_or(RemovalError::NotFound)?;
        self.ensure_unused(ResourceKind::Image, &image.name, options)?;
        self.delete_row(ResourceKind::Image, &image.name)
    }

    fn remove_container(&self, key: &str, options: RemoveOptions) -> std::result::Result<(), RemovalError> {
        let container = self
            .container(key)
            .map_err(unavailable)?
            .ok_or(RemovalError::NotFound)?;
        if container.status == ContainerStatus::Running && !options.force {
            return Err(RemovalError::Busy(format!(
                "container {} is running, stop it or use --force",
                container.name
            )));
        }
        self.delete_row(ResourceKind::Container, &container.name)
    }
}

impl ResourceEnumerator for StateStore {
    fn enumerate(&self, kind: ResourceKind) -> std::result::Result<Vec<ResourceEntry>, EnumerationError> {
        query::enumerate(Some(&self.conn), kind, &self.namespace)
            .map_err(|err| EnumerationError::new(kind, err))
    }
}

impl ResourceStore for StateStore {
    fn remove_one(
        &self,
        kind: ResourceKind,
        name: &str,
        options: RemoveOptions,
    ) -> std::result::Result<(), RemovalError> {
        let outcome = match kind {
            ResourceKind::Volume => self.remove_volume(name, options),
            ResourceKind::Network => self.remove_network(name),
            ResourceKind::Image => self.remove_image(name, options),
            ResourceKind::Container => self.remove_container(name, options),
            ResourceKind::Namespace => self.delete_row(kind, name),
        };
        if outcome.is_ok() {
            info!(%kind, name, namespace = %self.namespace, "removed");
        }
        outcome
    }
}

fn unavailable(err: StoreError) -> RemovalError {
    RemovalError::Unavailable(err.to_string())
}

fn image_basename(reference: &str) -> &str {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    last.split([':', '@']).next().unwrap_or(last)
}

/// Read-only view of the state database used while completing.
///
/// The connection is opened on the first enumeration. A data root without
/// a database, or a database without tables, enumerates as empty apart from
/// built-in networks and the default namespace.
pub struct StoreReader {
    path: PathBuf,
    namespace: String,
    conn: OnceCell<std::result::Result<Option<Connection>, String>>,
}

impl StoreReader {
    pub fn new(data_root: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: data_root.as_ref().join(STATE_DB),
            namespace: namespace.to_string(),
            conn: OnceCell::new(),
        }
    }

    fn connect(&self) -> Result<Option<Connection>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no state database");
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if !Migration::new(&conn)?.tables_exist()? {
            return Ok(None);
        }
        Ok(Some(conn))
    }
}

impl ResourceEnumerator for StoreReader {
    fn enumerate(&self, kind: ResourceKind) -> std::result::Result<Vec<ResourceEntry>, EnumerationError> {
        let conn = self
            .conn
            .get_or_init(|| self.connect().map_err(|err| err.to_string()))
            .as_ref()
            .map_err(|reason| EnumerationError::new(kind, reason))?;
        query::enumerate(conn.as_ref(), kind, &self.namespace)
            .map_err(|err| EnumerationError::new(kind, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_basename() {
        assert_eq!(image_basename("alpine:latest"), "alpine");
        assert_eq!(image_basename("ghcr.io/org/app:1.2"), "app");
        assert_eq!(image_basename("localhost:5000/app@sha256:00"), "app");
    }

    #[test]
    fn test_reader_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let reader = StoreReader::new(dir.path(), "default");
        let networks = reader.enumerate(ResourceKind::Network).unwrap();
        assert_eq!(networks.len(), 3);
        assert!(reader.enumerate(ResourceKind::Image).unwrap().is_empty());
        // Completing never creates the database.
        assert!(!dir.path().join(STATE_DB).exists());
    }

    #[test]
    fn test_reader_on_database_without_tables() {
        let dir = tempfile::tempdir().unwrap();
        Connection::open(dir.path().join(STATE_DB))
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();
        let reader = StoreReader::new(dir.path(), "default");
        assert_eq!(reader.enumerate(ResourceKind::Network).unwrap().len(), 3);
        assert!(reader.enumerate(ResourceKind::Volume).unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_bad_namespace() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StateStore::open(dir.path(), "../escape"),
            Err(StoreError::InvalidName { .. })
        ));
    }
}
