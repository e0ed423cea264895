//! Durable key-value storage trait and SQLite implementation.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Trait for durable storage backends.
///
/// Values survive application restarts.
pub trait KeyValueStorage: Send + Sync {
  /// Read the value stored under `key`.
  fn get(&self, key: &str) -> SyncResult<Option<String>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> SyncResult<()>;

  /// Delete `key`. Deleting an absent key is not an error.
  fn remove(&self, key: &str) -> SyncResult<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl KeyValueStorage for NoopStorage {
  fn get(&self, _key: &str) -> SyncResult<Option<String>> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _value: &str) -> SyncResult<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _key: &str) -> SyncResult<()> {
    Ok(())
  }
}

/// SQLite-based storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> SyncResult<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| SyncError::Storage(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(&path).map_err(|e| {
      SyncError::Storage(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;
    debug!(path = %path.display(), "opened cache database");

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> SyncResult<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> SyncResult<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> SyncResult<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| SyncError::Storage("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("todo-sync").join("cache.db"))
  }

  fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| SyncError::Storage(format!("Lock poisoned: {}", e)))
  }

  /// Run database migrations for the storage table.
  fn run_migrations(&self) -> SyncResult<()> {
    self
      .lock()?
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| SyncError::Storage(format!("Failed to run cache migrations: {}", e)))
  }
}

/// Schema for the storage table.
const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl KeyValueStorage for SqliteStorage {
  fn get(&self, key: &str) -> SyncResult<Option<String>> {
    let conn = self.lock()?;
    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| SyncError::Storage(format!("Failed to read {}: {}", key, e)))
  }

  fn set(&self, key: &str, value: &str) -> SyncResult<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| SyncError::Storage(format!("Failed to write {}: {}", key, e)))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> SyncResult<()> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| SyncError::Storage(format!("Failed to delete {}: {}", key, e)))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_get_set_remove() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    assert_eq!(storage.get("a").unwrap(), None);

    storage.set("a", "1").unwrap();
    storage.set("a", "2").unwrap();
    assert_eq!(storage.get("a").unwrap().as_deref(), Some("2"));

    storage.remove("a").unwrap();
    storage.remove("a").unwrap();
    assert_eq!(storage.get("a").unwrap(), None);
  }

  #[test]
  fn test_sqlite_survives_reopen() {
    let path = std::env::temp_dir().join(format!("todo-sync-test-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);

    {
      let storage = SqliteStorage::open(Some(&path)).unwrap();
      storage.set("persist:root", "{}").unwrap();
    }
    let storage = SqliteStorage::open(Some(&path)).unwrap();
    assert_eq!(storage.get("persist:root").unwrap().as_deref(), Some("{}"));

    drop(storage);
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn test_noop_storage_discards() {
    let storage = NoopStorage;
    storage.set("a", "1").unwrap();
    assert_eq!(storage.get("a").unwrap(), None);
  }
}
