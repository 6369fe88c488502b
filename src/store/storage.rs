//! Storage backends for the local booking list.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Error, Result};

use super::optimistic::LocalBooking;

/// Durable storage for the booking list.
///
/// The list is written as a whole on every mutation and read back once
/// at startup, so the surface is deliberately small.
pub trait BookingStorage: Send + Sync {
  /// Replace the persisted list with `entries`.
  fn save(&self, entries: &[LocalBooking]) -> Result<()>;

  /// Load the persisted list; empty when nothing was saved yet.
  fn load(&self) -> Result<Vec<LocalBooking>>;
}

/// Schema for the bookings table.
const BOOKINGS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_bookings (
    position INTEGER PRIMARY KEY,
    booking_id TEXT NOT NULL,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-backed booking storage.
///
/// Entries are stored as JSON blobs in list order; the whole list is
/// replaced inside one transaction per save.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the bookings database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("failed to create data directory: {e}")))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "failed to open database at {}: {e}",
        path.display()
      ))
    })?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Open at the platform default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// The default database path, e.g. `~/.local/share/staysync/bookings.db`.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Storage("could not determine data directory".to_string()))?;

    Ok(data_dir.join("staysync").join("bookings.db"))
  }

  /// In-memory database, used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::Storage(format!("failed to open in-memory database: {e}")))?;
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(BOOKINGS_SCHEMA)
      .map_err(|e| Error::Storage(format!("failed to run migrations: {e}")))?;

    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {e}")))
  }
}

impl BookingStorage for SqliteStorage {
  fn save(&self, entries: &[LocalBooking]) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| Error::Storage(format!("failed to begin transaction: {e}")))?;

    conn
      .execute("DELETE FROM local_bookings", [])
      .map_err(|e| Error::Storage(format!("failed to clear bookings: {e}")))?;

    for (position, entry) in entries.iter().enumerate() {
      let data = serde_json::to_vec(entry)
        .map_err(|e| Error::Storage(format!("failed to serialize booking: {e}")))?;

      conn
        .execute(
          "INSERT INTO local_bookings (position, booking_id, data) VALUES (?, ?, ?)",
          params![position as i64, entry.id(), data],
        )
        .map_err(|e| Error::Storage(format!("failed to store booking: {e}")))?;
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;

    debug!(count = entries.len(), "persisted booking list");
    Ok(())
  }

  fn load(&self) -> Result<Vec<LocalBooking>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT data FROM local_bookings ORDER BY position")
      .map_err(|e| Error::Storage(format!("failed to prepare query: {e}")))?;

    let rows: Vec<Vec<u8>> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| Error::Storage(format!("failed to query bookings: {e}")))?
      .filter_map(|r| r.ok())
      .collect();

    // Rows that no longer deserialize are dropped; the server remains
    // the source of truth.
    Ok(
      rows
        .iter()
        .filter_map(|data| serde_json::from_slice(data).ok())
        .collect(),
    )
  }
}

/// In-memory storage for tests and runs without persistence.
///
/// Clones share state, so a test can keep a handle for assertions while
/// the store owns another.
#[derive(Debug, Default)]
pub struct MemoryStorage {
  inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
  entries: Vec<LocalBooking>,
  saves: u32,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Entries as last persisted.
  pub fn saved(&self) -> Vec<LocalBooking> {
    match self.inner.lock() {
      Ok(inner) => inner.entries.clone(),
      Err(poisoned) => poisoned.into_inner().entries.clone(),
    }
  }

  /// How many times `save` has run.
  pub fn save_count(&self) -> u32 {
    match self.inner.lock() {
      Ok(inner) => inner.saves,
      Err(poisoned) => poisoned.into_inner().saves,
    }
  }
}

impl Clone for MemoryStorage {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl BookingStorage for MemoryStorage {
  fn save(&self, entries: &[LocalBooking]) -> Result<()> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {e}")))?;
    inner.entries = entries.to_vec();
    inner.saves += 1;
    Ok(())
  }

  fn load(&self) -> Result<Vec<LocalBooking>> {
    let inner = self
      .inner
      .lock()
      .map_err(|e| Error::Storage(format!("lock poisoned: {e}")))?;
    Ok(inner.entries.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Booking, BookingStatus};
  use crate::store::optimistic::SyncState;

  fn entry(id: &str) -> LocalBooking {
    LocalBooking {
      booking: Booking {
        id: id.to_string(),
        property_id: "1".to_string(),
        user_id: "1".to_string(),
        start_date: "2025-07-01".parse().unwrap(),
        end_date: "2025-07-03".parse().unwrap(),
        total_price: 240.0,
        status: BookingStatus::Confirmed,
      },
      sync: SyncState::Confirmed,
    }
  }

  #[test]
  fn test_sqlite_round_trips_in_order() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let entries = vec![entry("2"), entry("1"), entry("3")];

    storage.save(&entries).unwrap();
    assert_eq!(storage.load().unwrap(), entries);
  }

  #[test]
  fn test_sqlite_save_replaces_previous_list() {
    let storage = SqliteStorage::open_in_memory().unwrap();

    storage.save(&[entry("1"), entry("2")]).unwrap();
    storage.save(&[entry("3")]).unwrap();

    let loaded = storage.load().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id(), "3");
  }

  #[test]
  fn test_sqlite_list_survives_reopen() {
    let path =
      std::env::temp_dir().join(format!("staysync-storage-test-{}.db", uuid::Uuid::new_v4()));

    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.save(&[entry("1")]).unwrap();
    }

    let reopened = SqliteStorage::open(&path).unwrap();
    let loaded = reopened.load().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id(), "1");

    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn test_empty_storage_loads_empty_list() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert!(storage.load().unwrap().is_empty());
  }

  #[test]
  fn test_memory_storage_counts_saves_and_shares_state() {
    let storage = MemoryStorage::new();
    let handle = storage.clone();

    storage.save(&[entry("1")]).unwrap();
    storage.save(&[entry("1"), entry("2")]).unwrap();

    assert_eq!(handle.save_count(), 2);
    assert_eq!(handle.saved().len(), 2);
    assert_eq!(handle.load().unwrap().len(), 2);
  }
}
