//! Cached rental client that wraps the API with transparent caching.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::api::{RentalApi, RestApi};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Booking, BookingDraft, Property, User};
use crate::query::{QueryCache, QuerySnapshot};
use crate::store::{BookingStorage, LocalBooking, LocalBookingStore, SqliteStorage};

/// Rental client with transparent caching support.
///
/// This wraps the underlying API and provides the same reads, but
/// serves repeated requests from per-query caches and routes booking
/// writes through the optimistic local store.
#[derive(Clone)]
pub struct CachedClient {
  api: Arc<dyn RentalApi>,
  store: Arc<LocalBookingStore>,
  properties: QueryCache<Vec<Property>>,
  property: QueryCache<Property>,
  bookings: QueryCache<Vec<Booking>>,
  users: QueryCache<User>,
}

impl CachedClient {
  /// Create a new cached client from configuration.
  pub fn new(config: &Config) -> Result<Self> {
    let api = RestApi::new(&config.api.base_url)?;
    let storage = SqliteStorage::open(&config.bookings_db_path()?)?;

    Self::with_parts(
      Arc::new(api),
      Box::new(storage),
      config.cache.stale_time(),
    )
  }

  /// Create a cached client over an explicit API handle and storage.
  pub fn with_parts(
    api: Arc<dyn RentalApi>,
    storage: Box<dyn BookingStorage>,
    stale_time: Duration,
  ) -> Result<Self> {
    let store = LocalBookingStore::open(Arc::clone(&api), storage)?;

    Ok(Self {
      api,
      store: Arc::new(store),
      properties: QueryCache::new().with_stale_time(stale_time),
      property: QueryCache::new().with_stale_time(stale_time),
      bookings: QueryCache::new().with_stale_time(stale_time),
      users: QueryCache::new().with_stale_time(stale_time),
    })
  }

  /// List properties with caching, optionally narrowed by a search query.
  pub async fn properties(&self, search: Option<&str>) -> QuerySnapshot<Vec<Property>> {
    let key = QueryKey::Properties {
      search: search.map(String::from),
    };
    debug!(query = %key.description(), "fetching");

    self
      .properties
      .fetch(&key.cache_key(), || {
        let api = Arc::clone(&self.api);
        let search = search.map(String::from);
        async move { api.list_properties(search.as_deref()).await }
      })
      .await
  }

  /// Refresh the property list from the network regardless of freshness.
  pub async fn refetch_properties(&self, search: Option<&str>) -> QuerySnapshot<Vec<Property>> {
    let key = QueryKey::Properties {
      search: search.map(String::from),
    };

    self
      .properties
      .refetch(&key.cache_key(), || {
        let api = Arc::clone(&self.api);
        let search = search.map(String::from);
        async move { api.list_properties(search.as_deref()).await }
      })
      .await
  }

  /// Get a single property by id with caching.
  pub async fn property(&self, id: &str) -> QuerySnapshot<Property> {
    let key = QueryKey::PropertyDetail { id: id.to_string() };
    debug!(query = %key.description(), "fetching");

    self
      .property
      .fetch(&key.cache_key(), || {
        let api = Arc::clone(&self.api);
        let id = id.to_string();
        async move { api.get_property(&id).await }
      })
      .await
  }

  /// Get a user's bookings with caching.
  ///
  /// Each network fetch reconciles the server list into the local
  /// store, so pending placeholders survive the refresh.
  pub async fn bookings(&self, user_id: &str) -> QuerySnapshot<Vec<Booking>> {
    let key = QueryKey::Bookings {
      user_id: user_id.to_string(),
    };
    debug!(query = %key.description(), "fetching");

    self
      .bookings
      .fetch(&key.cache_key(), || {
        let store = Arc::clone(&self.store);
        let user_id = user_id.to_string();
        async move { store.fetch_bookings(&user_id).await }
      })
      .await
  }

  /// Refresh a user's bookings from the network regardless of freshness.
  pub async fn refetch_bookings(&self, user_id: &str) -> QuerySnapshot<Vec<Booking>> {
    let key = QueryKey::Bookings {
      user_id: user_id.to_string(),
    };

    self
      .bookings
      .refetch(&key.cache_key(), || {
        let store = Arc::clone(&self.store);
        let user_id = user_id.to_string();
        async move { store.fetch_bookings(&user_id).await }
      })
      .await
  }

  /// Get a user profile by id with caching.
  pub async fn user(&self, id: &str) -> QuerySnapshot<User> {
    let key = QueryKey::UserProfile { id: id.to_string() };
    debug!(query = %key.description(), "fetching");

    self
      .users
      .fetch(&key.cache_key(), || {
        let api = Arc::clone(&self.api);
        let id = id.to_string();
        async move { api.get_user(&id).await }
      })
      .await
  }

  /// Create a booking (not cached - write operation).
  ///
  /// The booking appears in the local list immediately and is replaced
  /// by the server's copy once the request settles. On success the
  /// user's cached booking list is marked stale so the next read picks
  /// up server truth.
  pub async fn book(&self, draft: &BookingDraft) -> Result<Booking> {
    let booking = self.store.add_booking(draft).await?;

    let key = QueryKey::Bookings {
      user_id: draft.user_id.clone(),
    };
    self.bookings.invalidate(&key.cache_key());

    Ok(booking)
  }

  /// The local booking list, pending placeholders included, without
  /// touching the network.
  pub fn local_bookings(&self) -> Vec<Booking> {
    self.store.bookings()
  }

  /// Local booking entries together with their sync state.
  pub fn local_entries(&self) -> Vec<LocalBooking> {
    self.store.entries()
  }

  /// The most recent booking error, if any.
  pub fn booking_error(&self) -> Option<Error> {
    self.store.error()
  }

  pub fn clear_booking_error(&self) {
    self.store.clear_error()
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for rental API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKey {
  /// List properties, optionally narrowed by a search query
  Properties { search: Option<String> },
  /// Get a single property by id
  PropertyDetail { id: String },
  /// Get a user's bookings
  Bookings { user_id: String },
  /// Get a user profile
  UserProfile { id: String },
}

impl QueryKey {
  /// Stable cache key for this query.
  pub fn cache_key(&self) -> String {
    match self {
      Self::Properties { search } => {
        format!(
          "properties:{}",
          search.as_deref().map(normalize_query).unwrap_or_default()
        )
      }
      Self::PropertyDetail { id } => format!("property:{}", id),
      Self::Bookings { user_id } => format!("bookings:{}", user_id),
      Self::UserProfile { id } => format!("user:{}", id),
    }
  }

  /// Human-readable label for logs.
  pub fn description(&self) -> String {
    match self {
      Self::Properties { search } => {
        if let Some(q) = search {
          format!("properties matching '{}'", q)
        } else {
          "all properties".to_string()
        }
      }
      Self::PropertyDetail { id } => format!("property {}", id),
      Self::Bookings { user_id } => format!("bookings for user {}", user_id),
      Self::UserProfile { id } => format!("user {}", id),
    }
  }
}

/// Normalize a search query for consistent cache keys.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}
