//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::traits::{CacheEntry, CachedEntity, Clock, SystemClock};
use crate::db::{self, Database};
use crate::error::StorageError;
use crate::gripp::types::Project;

/// Trait for cache storage backends.
///
/// Two independent collections: project records keyed by id, and generic
/// keyed cache entries. No network or freshness policy lives here.
pub trait CacheStorage: Send + Sync + 'static {
  /// Bring the storage layout up to date. Idempotent.
  fn init(&self) -> Result<(), StorageError>;

  /// All stored projects with their write stamps.
  fn get_all_records(&self) -> Result<Vec<CachedEntity<Project>>, StorageError>;

  /// Upsert a batch atomically, stamping every row with the current time.
  /// A stored project with the same id is replaced in full.
  fn save_records(&self, records: &[Project]) -> Result<(), StorageError>;

  /// Latest write stamp across all projects, `None` when there are none.
  fn get_most_recent_modification(&self) -> Result<Option<DateTime<Utc>>, StorageError>;

  fn set_cache_entry<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    timestamp: DateTime<Utc>,
  ) -> Result<(), StorageError>;

  fn get_cache_entry<T: DeserializeOwned>(
    &self,
    key: &str,
  ) -> Result<Option<CacheEntry<T>>, StorageError>;

  /// Empty the cache-entry collection only.
  fn clear_cache_entries(&self) -> Result<(), StorageError>;

  /// Empty both collections in one transaction.
  fn clear_all(&self) -> Result<(), StorageError>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
  clock: Arc<dyn Clock>,
}

impl SqliteStorage {
  /// Open (creating if absent) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    debug!(path = %path.display(), "Opening cache database");
    Ok(Self::from_database(Database::open(path)?))
  }

  /// Open the cache database at the default location.
  pub fn open_default() -> Result<Self, StorageError> {
    let path = Database::default_path().ok_or_else(|| {
      StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "Could not determine data directory",
      ))
    })?;
    Self::open(&path)
  }

  /// Open a private in-memory cache.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Ok(Self::from_database(Database::open_in_memory()?))
  }

  fn from_database(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_connection()),
      clock: Arc::new(SystemClock),
    }
  }

  /// Use `clock` for write stamps.
  #[cfg(test)]
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::LockPoisoned(e.to_string()))
  }
}

impl CacheStorage for SqliteStorage {
  fn init(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;
    db::migrate(&conn)
  }

  fn get_all_records(&self) -> Result<Vec<CachedEntity<Project>>, StorageError> {
    let conn = self.lock()?;

    let mut stmt = conn.prepare("SELECT data, last_modified FROM projects ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
      let (data, last_modified) = row?;
      records.push(CachedEntity {
        entity: serde_json::from_str(&data)?,
        cached_at: parse_timestamp(&last_modified)?,
      });
    }

    Ok(records)
  }

  fn save_records(&self, records: &[Project]) -> Result<(), StorageError> {
    let mut conn = self.lock()?;
    let stamp = format_timestamp(self.clock.now());

    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO projects (id, data, last_modified) VALUES (?, ?, ?)",
      )?;
      for record in records {
        let data = serde_json::to_string(record)?;
        stmt.execute(params![record.id, data, stamp])?;
      }
    }
    tx.commit()?;

    debug!(count = records.len(), "Saved projects to cache");
    Ok(())
  }

  fn get_most_recent_modification(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
    let conn = self.lock()?;

    let latest: Option<String> =
      conn.query_row("SELECT MAX(last_modified) FROM projects", [], |row| row.get(0))?;

    latest.as_deref().map(parse_timestamp).transpose()
  }

  fn set_cache_entry<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    timestamp: DateTime<Utc>,
  ) -> Result<(), StorageError> {
    let conn = self.lock()?;
    let data = serde_json::to_string(value)?;

    conn.execute(
      "INSERT OR REPLACE INTO cache_entries (key, value, timestamp) VALUES (?, ?, ?)",
      params![key, data, format_timestamp(timestamp)],
    )?;

    Ok(())
  }

  fn get_cache_entry<T: DeserializeOwned>(
    &self,
    key: &str,
  ) -> Result<Option<CacheEntry<T>>, StorageError> {
    let conn = self.lock()?;

    let row: Option<(String, String)> = conn
      .query_row(
        "SELECT value, timestamp FROM cache_entries WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((value, timestamp)) => Ok(Some(CacheEntry {
        key: key.to_string(),
        value: serde_json::from_str(&value)?,
        timestamp: parse_timestamp(&timestamp)?,
      })),
      None => Ok(None),
    }
  }

  fn clear_cache_entries(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM cache_entries", [])?;
    Ok(())
  }

  fn clear_all(&self) -> Result<(), StorageError> {
    let mut conn = self.lock()?;

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM projects", [])?;
    tx.execute("DELETE FROM cache_entries", [])?;
    tx.commit()?;

    Ok(())
  }
}

/// Fixed-width UTC form, so lexical order in SQLite equals time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StorageError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| StorageError::Timestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::testing::{project, ManualClock};
  use chrono::Duration;
  use serde_json::json;

  fn storage() -> (SqliteStorage, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let storage = SqliteStorage::open_in_memory()
      .unwrap()
      .with_clock(clock.clone());
    (storage, clock)
  }

  fn ids(storage: &SqliteStorage) -> Vec<i64> {
    storage
      .get_all_records()
      .unwrap()
      .into_iter()
      .map(|r| r.entity.id)
      .collect()
  }

  #[test]
  fn test_empty_store() {
    let (storage, _) = storage();
    assert!(storage.get_all_records().unwrap().is_empty());
    assert_eq!(storage.get_most_recent_modification().unwrap(), None);
  }

  #[test]
  fn test_batches_union_with_last_write_winning() {
    let (storage, _) = storage();

    storage
      .save_records(&[project(1, 10), project(2, 10)])
      .unwrap();
    let mut renamed = project(2, 10);
    renamed.name = "Renamed".to_string();
    storage.save_records(&[renamed, project(3, 11)]).unwrap();

    let records = storage.get_all_records().unwrap();
    assert_eq!(ids(&storage), vec![1, 2, 3]);
    assert_eq!(records[1].entity.name, "Renamed");
  }

  #[test]
  fn test_overwrite_is_wholesale() {
    let (storage, _) = storage();

    let mut full = project(1, 10);
    full.description = Some("Long description".to_string());
    storage.save_records(&[full]).unwrap();
    storage.save_records(&[project(1, 10)]).unwrap();

    let records = storage.get_all_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity.description, None);
  }

  #[test]
  fn test_line_amounts_read_back_exactly() {
    let (storage, _) = storage();
    let amounts = [0.1 + 0.2, 1.0 / 3.0, 2.0_f64.sqrt(), 1e-7 * 3.0, 123456.789012345];

    let mut stored = project(1, 10);
    stored.projectlines = serde_json::from_value(json!(amounts
      .iter()
      .enumerate()
      .map(|(i, amount)| json!({"id": i, "amount": amount}))
      .collect::<Vec<_>>()))
    .unwrap();
    storage.save_records(&[stored.clone()]).unwrap();

    let records = storage.get_all_records().unwrap();
    assert_eq!(records[0].entity, stored);
  }

  #[test]
  fn test_stamp_is_time_of_latest_write() {
    let (storage, clock) = storage();
    let first = clock.now();

    storage.save_records(&[project(1, 10)]).unwrap();
    clock.advance(Duration::minutes(3));
    storage.save_records(&[project(1, 10)]).unwrap();

    let records = storage.get_all_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cached_at, first + Duration::minutes(3));
    assert_eq!(
      storage.get_most_recent_modification().unwrap(),
      Some(first + Duration::minutes(3))
    );
  }

  #[test]
  fn test_most_recent_modification_is_maximum() {
    let (storage, clock) = storage();
    let start = clock.now();

    storage.save_records(&[project(1, 10)]).unwrap();
    clock.advance(Duration::seconds(90));
    storage.save_records(&[project(2, 10)]).unwrap();

    assert_eq!(
      storage.get_most_recent_modification().unwrap(),
      Some(start + Duration::seconds(90))
    );
  }

  #[test]
  fn test_failed_batch_writes_nothing() {
    let (storage, _) = storage();
    storage.save_records(&[project(1, 10)]).unwrap();

    // Make the second insert of the batch fail
    storage
      .lock()
      .unwrap()
      .execute_batch(
        "CREATE TRIGGER reject_two BEFORE INSERT ON projects WHEN NEW.id = 2
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
      )
      .unwrap();

    let result = storage.save_records(&[project(3, 10), project(2, 10)]);
    assert!(matches!(result, Err(StorageError::Sqlite(_))));
    assert_eq!(ids(&storage), vec![1]);
  }

  #[test]
  fn test_cache_entries_round_trip() {
    let (storage, clock) = storage();
    let ts = clock.now();

    storage
      .set_cache_entry("probe", &json!({"ok": true}), ts)
      .unwrap();

    let entry = storage
      .get_cache_entry::<serde_json::Value>("probe")
      .unwrap()
      .unwrap();
    assert_eq!(entry.key, "probe");
    assert_eq!(entry.value["ok"], true);
    assert_eq!(entry.timestamp, ts);
    assert!(storage
      .get_cache_entry::<serde_json::Value>("missing")
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_clear_cache_entries_keeps_projects() {
    let (storage, clock) = storage();
    storage.save_records(&[project(1, 10)]).unwrap();
    storage.set_cache_entry("k", &1, clock.now()).unwrap();

    storage.clear_cache_entries().unwrap();

    assert!(storage.get_cache_entry::<i32>("k").unwrap().is_none());
    assert_eq!(ids(&storage), vec![1]);
  }

  #[test]
  fn test_clear_all_empties_both_collections() {
    let (storage, clock) = storage();
    storage.save_records(&[project(1, 10)]).unwrap();
    storage.set_cache_entry("k", &1, clock.now()).unwrap();

    storage.clear_all().unwrap();

    assert!(storage.get_all_records().unwrap().is_empty());
    assert!(storage.get_cache_entry::<i32>("k").unwrap().is_none());
    assert_eq!(storage.get_most_recent_modification().unwrap(), None);
  }

  #[test]
  fn test_corrupt_row_is_a_storage_failure() {
    let (storage, _) = storage();
    storage
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO projects (id, data, last_modified) VALUES (1, 'not json', ?)",
        params![format_timestamp(Utc::now())],
      )
      .unwrap();

    assert!(matches!(
      storage.get_all_records(),
      Err(StorageError::Serialization(_))
    ));
  }

  #[test]
  fn test_init_is_idempotent() {
    let (storage, _) = storage();
    storage.save_records(&[project(1, 10)]).unwrap();
    storage.init().unwrap();
    storage.init().unwrap();
    assert_eq!(ids(&storage), vec![1]);
  }

  #[test]
  fn test_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    SqliteStorage::open(&path)
      .unwrap()
      .save_records(&[project(4, 10)])
      .unwrap();

    let reopened = SqliteStorage::open(&path).unwrap();
    assert_eq!(ids(&reopened), vec![4]);
  }

  #[test]
  fn test_timestamp_format_sorts_lexically() {
    let early = "2024-01-01T09:59:59.999999Z".parse::<DateTime<Utc>>().unwrap();
    let late = early + Duration::microseconds(1);
    assert!(format_timestamp(early) < format_timestamp(late));
    assert_eq!(parse_timestamp(&format_timestamp(early)).unwrap(), early);
  }
}
