//! Migration lifecycle for the state database.
//!
//! [`Migration::up`] is run every time a [`StateStore`](crate::StateStore)
//! is opened for writing. It only creates what is missing, so opening an
//! existing database never touches its rows.
//!
//! # Example
//!
//! ```no_run
//! use boxctl_store::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("/var/lib/boxctl/state.db").unwrap();
//! let migration = Migration::new(&conn).unwrap();
//! migration.up().unwrap();
//!
//! let status = migration.status().unwrap();
//! println!("volumes: {}", status.volume_count);
//! ```

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::schema::{SCHEMA_VERSION, generate_schema_sql};

/// Creates the state tables and reports on them.
pub struct Migration<'a> {
    conn: &'a Connection,
}

impl<'a> Migration<'a> {
    /// Creates a migration manager for the given connection.
    ///
    /// Enables foreign key enforcement on the connection.
    pub fn new(conn: &'a Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Creates all tables and indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` so it is safe to call multiple times.
    /// Executes within a transaction.
    pub fn up(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&generate_schema_sql())?;
        tx.commit()?;
        debug!(version = SCHEMA_VERSION, "state schema up to date");
        Ok(())
    }

    /// Returns the current status of the database.
    pub fn status(&self) -> Result<MigrationStatus> {
        let schema_version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if !self.tables_exist()? {
            return Ok(MigrationStatus {
                tables_exist: false,
                schema_version,
                ..MigrationStatus::default()
            });
        }

        Ok(MigrationStatus {
            tables_exist: true,
            schema_version,
            volume_count: self.count_rows("volumes")?,
            network_count: self.count_rows("networks")?,
            image_count: self.count_rows("images")?,
            container_count: self.count_rows("containers")?,
        })
    }

    /// Whether every state table exists. Reads only the schema catalog.
    pub fn tables_exist(&self) -> Result<bool> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('volumes', 'networks', 'images', 'containers', 'container_mounts')",
        )?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count == 5)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let mut stmt = self.conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Snapshot of the database state, returned by [`Migration::status`].
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Whether every state table exists.
    pub tables_exist: bool,
    /// Value of `PRAGMA user_version`.
    pub schema_version: i64,
    /// Rows across all namespaces.
    pub volume_count: usize,
    pub network_count: usize,
    pub image_count: usize,
    pub container_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_on_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let status = Migration::new(&conn).unwrap().status().unwrap();
        assert!(!status.tables_exist);
        assert!(!Migration::new(&conn).unwrap().tables_exist().unwrap());
        assert_eq!(status.schema_version, 0);
        assert_eq!(status.volume_count, 0);
    }

    #[test]
    fn test_up_and_status() {
        let conn = Connection::open_in_memory().unwrap();
        let migration = Migration::new(&conn).unwrap();
        migration.up().unwrap();

        assert!(migration.tables_exist().unwrap());
        let status = migration.status().unwrap();
        assert!(status.tables_exist);
        assert_eq!(status.schema_version, SCHEMA_VERSION);
        assert_eq!(status.container_count, 0);
    }

    #[test]
    fn test_up_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let migration = Migration::new(&conn).unwrap();
        migration.up().unwrap();
        conn.execute(
            "INSERT INTO volumes (namespace, name, mountpoint, created_at) VALUES ('default', 'v', '/x', 'now')",
            [],
        )
        .unwrap();

        migration.up().unwrap();
        assert_eq!(migration.status().unwrap().volume_count, 1);
    }
}
