//! The user's booking list with optimistic adds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::RentalApi;
use crate::error::{Error, Result};
use crate::model::{Booking, BookingDraft, BookingStatus};

use super::optimistic::{self, LocalBooking};
use super::storage::BookingStorage;

/// Local booking list bridging to the remote store.
///
/// The list is available synchronously for immediate consumption; the
/// remote store stays the source of truth and [`fetch_bookings`]
/// reconciles to it. Every mutation is written to storage so the list
/// survives restarts.
///
/// [`fetch_bookings`]: LocalBookingStore::fetch_bookings
pub struct LocalBookingStore {
  api: Arc<dyn RentalApi>,
  storage: Box<dyn BookingStorage>,
  state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
  entries: Vec<LocalBooking>,
  error: Option<Error>,
}

impl LocalBookingStore {
  /// Creates a store over `storage`, rehydrating any persisted list.
  pub fn open(api: Arc<dyn RentalApi>, storage: Box<dyn BookingStorage>) -> Result<Self> {
    let entries = storage.load()?;
    debug!(count = entries.len(), "rehydrated local bookings");

    Ok(Self {
      api,
      storage,
      state: Mutex::new(StoreState {
        entries,
        error: None,
      }),
    })
  }

  /// Current local list, placeholders included.
  pub fn bookings(&self) -> Vec<Booking> {
    self
      .lock_state()
      .entries
      .iter()
      .map(|e| e.booking.clone())
      .collect()
  }

  /// Current local list with sync tags.
  pub fn entries(&self) -> Vec<LocalBooking> {
    self.lock_state().entries.clone()
  }

  /// Error retained from the last failed fetch or create, if any.
  pub fn error(&self) -> Option<Error> {
    self.lock_state().error.clone()
  }

  pub fn clear_error(&self) {
    self.lock_state().error = None;
  }

  /// Loads the user's bookings from the server and reconciles the local
  /// list to them. Placeholders still awaiting confirmation are kept.
  ///
  /// On failure the previous list stays untouched and the error is
  /// retained until the next successful fetch or [`clear_error`].
  ///
  /// [`clear_error`]: LocalBookingStore::clear_error
  pub async fn fetch_bookings(&self, user_id: &str) -> Result<Vec<Booking>> {
    match self.api.bookings_for_user(user_id).await {
      Ok(server) => {
        let mut state = self.lock_state();
        optimistic::reconcile_with_server(&mut state.entries, server);
        state.error = None;
        self.persist(&state.entries);

        Ok(state.entries.iter().map(|e| e.booking.clone()).collect())
      }
      Err(err) => {
        self.lock_state().error = Some(err.clone());
        Err(err)
      }
    }
  }

  /// Validates `draft`, optimistically inserts a placeholder, and
  /// submits the create to the server.
  ///
  /// Validation failures return before any network call is made. When
  /// the create fails, the placeholder is removed again and the error is
  /// both returned and retained; the list never keeps a ghost entry for
  /// a failed create.
  pub async fn add_booking(&self, draft: &BookingDraft) -> Result<Booking> {
    // A new attempt starts from a clean error state.
    self.clear_error();
    draft.validate()?;

    let temp_id = format!("temp-{}", Uuid::new_v4());
    let placeholder = Booking {
      id: temp_id.clone(),
      property_id: draft.property_id.clone(),
      user_id: draft.user_id.clone(),
      start_date: draft.start_date,
      end_date: draft.end_date,
      total_price: draft.total_price,
      status: BookingStatus::Pending,
    };

    {
      let mut state = self.lock_state();
      optimistic::insert_pending(&mut state.entries, placeholder);
      self.persist(&state.entries);
    }

    match self.api.create_booking(&draft.to_new_booking()).await {
      Ok(confirmed) => {
        {
          let mut state = self.lock_state();
          optimistic::confirm(&mut state.entries, &temp_id, confirmed.clone());
          self.persist(&state.entries);
        }
        debug!(id = %confirmed.id, "booking confirmed");

        Ok(confirmed)
      }
      Err(err) => {
        warn!(%err, "booking create failed, rolling back placeholder");
        let mut state = self.lock_state();
        optimistic::rollback(&mut state.entries, &temp_id);
        state.error = Some(err.clone());
        self.persist(&state.entries);

        Err(err)
      }
    }
  }

  /// Writes the list to storage. Called with the state lock held so
  /// snapshots reach storage in mutation order. Persistence is a
  /// convenience cache, so a write failure degrades to an in-memory
  /// list rather than failing the operation.
  fn persist(&self, entries: &[LocalBooking]) {
    if let Err(err) = self.storage.save(entries) {
      warn!(%err, "failed to persist booking list");
    }
  }

  fn lock_state(&self) -> MutexGuard<'_, StoreState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl std::fmt::Debug for LocalBookingStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.lock_state();
    f.debug_struct("LocalBookingStore")
      .field("entries", &state.entries.len())
      .field("error", &state.error)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::MockApi;
  use crate::store::storage::{MemoryStorage, SqliteStorage};
  use crate::store::SyncState;
  use chrono::NaiveDate;
  use std::time::Duration;

  fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
  }

  fn draft(property_id: &str) -> BookingDraft {
    BookingDraft {
      property_id: property_id.to_string(),
      user_id: "1".to_string(),
      start_date: date("2025-07-01"),
      end_date: date("2025-07-03"),
      guests: 2,
      total_price: 240.0,
    }
  }

  fn server_booking(id: &str, user_id: &str) -> Booking {
    Booking {
      id: id.to_string(),
      property_id: "1".to_string(),
      user_id: user_id.to_string(),
      start_date: date("2025-07-01"),
      end_date: date("2025-07-03"),
      total_price: 240.0,
      status: BookingStatus::Confirmed,
    }
  }

  fn open_store() -> (LocalBookingStore, MockApi, MemoryStorage) {
    let api = MockApi::new();
    let storage = MemoryStorage::new();
    let store =
      LocalBookingStore::open(Arc::new(api.clone()), Box::new(storage.clone())).unwrap();
    (store, api, storage)
  }

  #[tokio::test]
  async fn test_add_booking_leaves_exactly_one_entry() {
    let (store, api, _storage) = open_store();

    let booking = store.add_booking(&draft("1")).await.unwrap();
    assert_eq!(booking.id, "101");

    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id(), "101");
    assert!(!entries[0].is_pending());
    assert!(store.error().is_none());
    assert_eq!(api.bookings().len(), 1);
  }

  #[tokio::test]
  async fn test_invalid_draft_makes_no_network_call() {
    let (store, api, _storage) = open_store();

    let mut inverted = draft("1");
    inverted.end_date = inverted.start_date;
    let err = store.add_booking(&inverted).await.unwrap_err();
    assert!(err.is_validation());

    let mut empty = draft("1");
    empty.guests = 0;
    assert!(store.add_booking(&empty).await.is_err());

    assert_eq!(api.call_count(), 0);
    assert!(store.bookings().is_empty());
  }

  #[tokio::test]
  async fn test_failed_create_rolls_back_to_previous_state() {
    let (store, api, _storage) = open_store();
    let before = store.bookings();

    api.fail_next(Error::remote("boom"));
    let err = store.add_booking(&draft("1")).await.unwrap_err();

    assert_eq!(err, Error::remote("boom"));
    assert_eq!(store.bookings(), before);
    assert_eq!(store.error(), Some(Error::remote("boom")));

    // The next successful attempt clears the retained error.
    store.add_booking(&draft("1")).await.unwrap();
    assert!(store.error().is_none());
    assert_eq!(store.bookings().len(), 1);
  }

  #[tokio::test]
  async fn test_placeholder_is_visible_while_create_in_flight() {
    let (store, api, _storage) = open_store();
    api.set_delay(Duration::from_millis(50));
    let store = Arc::new(store);

    let handle = {
      let store = Arc::clone(&store);
      tokio::spawn(async move { store.add_booking(&draft("1")).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_pending());
    assert!(entries[0].id().starts_with("temp-"));

    handle.await.unwrap().unwrap();
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id(), "101");
    assert!(!entries[0].is_pending());
  }

  #[tokio::test]
  async fn test_fetch_reconciles_to_server_list() {
    let (store, api, _storage) = open_store();
    api.seed_bookings(vec![
      server_booking("7", "1"),
      server_booking("8", "1"),
      server_booking("9", "2"),
    ]);

    let bookings = store.fetch_bookings("1").await.unwrap();
    let ids: Vec<&str> = bookings.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["7", "8"]);

    // Server truth replaces rows that disappeared remotely.
    api.seed_bookings(vec![server_booking("8", "1")]);
    let bookings = store.fetch_bookings("1").await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, "8");
  }

  #[tokio::test]
  async fn test_fetch_keeps_unconfirmed_placeholder() {
    let api = MockApi::new();
    let storage = MemoryStorage::new();
    storage
      .save(&[LocalBooking {
        booking: Booking {
          id: "temp-abc".to_string(),
          property_id: "1".to_string(),
          user_id: "1".to_string(),
          start_date: date("2025-07-01"),
          end_date: date("2025-07-03"),
          total_price: 240.0,
          status: BookingStatus::Pending,
        },
        sync: SyncState::Pending {
          temp_id: "temp-abc".to_string(),
        },
      }])
      .unwrap();
    let store =
      LocalBookingStore::open(Arc::new(api.clone()), Box::new(storage.clone())).unwrap();

    api.seed_bookings(vec![server_booking("7", "1")]);
    store.fetch_bookings("1").await.unwrap();

    let entries = store.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id(), "7");
    assert!(entries[1].is_pending());
    assert_eq!(entries[1].id(), "temp-abc");
  }

  #[tokio::test]
  async fn test_fetch_failure_retains_error_and_list() {
    let (store, api, _storage) = open_store();
    api.seed_bookings(vec![server_booking("7", "1")]);
    store.fetch_bookings("1").await.unwrap();

    api.fail_next(Error::remote("offline"));
    let err = store.fetch_bookings("1").await.unwrap_err();
    assert_eq!(err, Error::remote("offline"));
    assert_eq!(store.bookings().len(), 1);
    assert_eq!(store.error(), Some(Error::remote("offline")));

    // A successful fetch clears it again.
    store.fetch_bookings("1").await.unwrap();
    assert!(store.error().is_none());
  }

  #[tokio::test]
  async fn test_every_mutation_is_persisted() {
    let (store, api, storage) = open_store();
    api.seed_bookings(vec![server_booking("7", "1")]);

    // Placeholder write plus confirmation write.
    store.add_booking(&draft("1")).await.unwrap();
    assert_eq!(storage.save_count(), 2);

    store.fetch_bookings("1").await.unwrap();
    assert_eq!(storage.save_count(), 3);
    assert_eq!(storage.saved().len(), 2);
  }

  #[tokio::test]
  async fn test_overlapping_adds_keep_storage_matching_memory() {
    let (store, api, storage) = open_store();
    api.set_delay(Duration::from_millis(20));
    let store = Arc::new(store);

    let handles: Vec<_> = ["1", "2", "3"]
      .into_iter()
      .map(|property_id| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.add_booking(&draft(property_id)).await })
      })
      .collect();
    for handle in handles {
      handle.await.unwrap().unwrap();
    }

    // The last snapshot written is the one the final mutation saw.
    let in_memory: Vec<String> = store.entries().iter().map(|e| e.id().to_string()).collect();
    let persisted: Vec<String> = storage.saved().iter().map(|e| e.id().to_string()).collect();
    assert_eq!(in_memory.len(), 3);
    assert_eq!(persisted, in_memory);
    assert_eq!(storage.save_count(), 6);
  }

  #[tokio::test]
  async fn test_bookings_survive_restart_with_sqlite() {
    let path =
      std::env::temp_dir().join(format!("staysync-store-test-{}.db", Uuid::new_v4()));
    let api = MockApi::new();

    {
      let store = LocalBookingStore::open(
        Arc::new(api.clone()),
        Box::new(SqliteStorage::open(&path).unwrap()),
      )
      .unwrap();
      store.add_booking(&draft("1")).await.unwrap();
    }

    let reopened = LocalBookingStore::open(
      Arc::new(api),
      Box::new(SqliteStorage::open(&path).unwrap()),
    )
    .unwrap();
    let bookings = reopened.bookings();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, "101");

    let _ = std::fs::remove_file(&path);
  }
}
