pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StorageError;

/// Database connection wrapper for caching
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    let db = Self { conn };
    db.run_migrations()?;
    debug!(version = db.version()?, path = %path.display(), "Cache database ready");

    Ok(db)
  }

  /// Open a private in-memory database
  pub fn open_in_memory() -> Result<Self, StorageError> {
    let db = Self {
      conn: Connection::open_in_memory()?,
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Get the default database path
  pub fn default_path() -> Option<PathBuf> {
    let data_dir = dirs::data_dir().or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))?;
    Some(data_dir.join("gripp-dash").join("cache.db"))
  }

  /// Schema version currently recorded in the database
  pub fn version(&self) -> Result<u32, StorageError> {
    schema_version(&self.conn)
  }

  /// Bring the schema up to date. Safe to call any number of times.
  pub fn run_migrations(&self) -> Result<(), StorageError> {
    migrate(&self.conn)
  }

  pub fn into_connection(self) -> Connection {
    self.conn
  }
}

fn schema_version(conn: &Connection) -> Result<u32, StorageError> {
  Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Apply every migration past the recorded version.
pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
  apply_migrations(conn, schema::MIGRATIONS)
}

fn apply_migrations(conn: &Connection, migrations: &[&str]) -> Result<(), StorageError> {
  let current = schema_version(conn)? as usize;

  for (index, sql) in migrations.iter().enumerate().skip(current) {
    let version = (index + 1) as i64;
    // user_version is part of the transaction; dropping it uncommitted rolls back
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;
    info!(version, "Migrated cache schema");
  }

  Ok(())
}
