//! Keyed cache for remote query results.
//!
//! Inspired by TanStack Query: each key holds the best-known value plus
//! loading and error state. Concurrent fetches for a key are coalesced
//! into one network call, values older than a configurable stale time
//! trigger a new round trip on their next read, and `refetch` supersedes
//! any fetch still running for that key.
//!
//! # Example
//!
//! ```ignore
//! let cache: QueryCache<Vec<Property>> = QueryCache::new();
//! let api = api.clone();
//! let snapshot = cache
//!   .fetch("properties", move || async move { api.list_properties(None).await })
//!   .await;
//!
//! if let Some(properties) = &snapshot.data {
//!   render(properties);
//! }
//! if let Some(error) = &snapshot.error {
//!   render_error(error);
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot<T> {
  /// Best-known value. Kept across failed refreshes so consumers can
  /// keep showing stale data.
  pub data: Option<T>,
  /// Error from the most recent failed fetch, cleared by the next
  /// successful one.
  pub error: Option<Error>,
  /// A fetch is in flight and there is no value to show yet.
  pub is_loading: bool,
  /// A fetch is in flight behind an existing value.
  pub is_refetching: bool,
  /// The value is past its stale time (or invalidated) and the next
  /// read will go back to the network.
  pub is_stale: bool,
}

impl<T> QuerySnapshot<T> {
  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

impl<T> Default for QuerySnapshot<T> {
  fn default() -> Self {
    Self {
      data: None,
      error: None,
      is_loading: false,
      is_refetching: false,
      is_stale: false,
    }
  }
}

struct Entry<T> {
  data: Option<T>,
  error: Option<Error>,
  fetched_at: Option<Instant>,
  /// Bumped for every started fetch; a completion only applies if its
  /// generation is still the current one.
  generation: u64,
  /// Present while a fetch for this key is running. Joiners wait on it.
  inflight: Option<watch::Receiver<()>>,
}

impl<T> Default for Entry<T> {
  fn default() -> Self {
    Self {
      data: None,
      error: None,
      fetched_at: None,
      generation: 0,
      inflight: None,
    }
  }
}

impl<T> Entry<T> {
  fn is_fresh(&self, stale_time: Duration) -> bool {
    match (&self.data, self.fetched_at) {
      (Some(_), Some(at)) => at.elapsed() <= stale_time,
      _ => false,
    }
  }
}

type Entries<T> = Arc<Mutex<HashMap<String, Entry<T>>>>;

/// What a `fetch` call decided to do for its key.
enum FetchPlan {
  /// Fresh value in the cache, answer immediately.
  Hit,
  /// Another fetch is in flight, wait for it instead of duplicating it.
  Join(watch::Receiver<()>),
  /// Run the fetcher as the new current generation.
  Run {
    generation: u64,
    tx: watch::Sender<()>,
    rx: watch::Receiver<()>,
  },
}

/// Keyed query cache with per-key loading, error, and staleness state.
///
/// Clones share the same entries, so one instance can be handed to
/// several tasks.
pub struct QueryCache<T> {
  entries: Entries<T>,
  stale_time: Duration,
}

impl<T: Clone + Send + 'static> QueryCache<T> {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      stale_time: Duration::from_secs(300), // Default 5 minutes
    }
  }

  /// Set how long a cached value counts as fresh.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Returns the value for `key`, fetching it if the cache has nothing
  /// fresh.
  ///
  /// A fresh value answers immediately without calling `fetcher`. If a
  /// fetch for the key is already in flight, this call waits for that
  /// result instead of issuing a second request. Otherwise the fetcher
  /// runs; its failure is recorded in the entry but any previous value
  /// is kept.
  pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> QuerySnapshot<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let plan = {
      let mut entries = self.lock_entries();
      let entry = entries.entry(key.to_string()).or_default();
      if let Some(rx) = &entry.inflight {
        FetchPlan::Join(rx.clone())
      } else if entry.is_fresh(self.stale_time) {
        FetchPlan::Hit
      } else {
        let (tx, rx) = watch::channel(());
        entry.generation += 1;
        entry.inflight = Some(rx.clone());
        FetchPlan::Run {
          generation: entry.generation,
          tx,
          rx,
        }
      }
    };

    match plan {
      FetchPlan::Hit => self.snapshot(key),
      FetchPlan::Join(rx) => self.join(key, rx).await,
      FetchPlan::Run { generation, tx, rx } => {
        self.execute(key, generation, tx, rx, fetcher()).await
      }
    }
  }

  /// Forces a fetch for `key`, ignoring freshness and superseding any
  /// fetch already in flight. The previous value stays visible while
  /// the refetch runs.
  pub async fn refetch<F, Fut>(&self, key: &str, fetcher: F) -> QuerySnapshot<T>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (tx, rx) = watch::channel(());
    let generation = {
      let mut entries = self.lock_entries();
      let entry = entries.entry(key.to_string()).or_default();
      entry.generation += 1;
      entry.inflight = Some(rx.clone());
      entry.generation
    };

    self.execute(key, generation, tx, rx, fetcher()).await
  }

  /// Current state for `key` without triggering any fetch.
  pub fn snapshot(&self, key: &str) -> QuerySnapshot<T> {
    let entries = self.lock_entries();
    match entries.get(key) {
      Some(entry) => QuerySnapshot {
        data: entry.data.clone(),
        error: entry.error.clone(),
        is_loading: entry.inflight.is_some() && entry.data.is_none(),
        is_refetching: entry.inflight.is_some() && entry.data.is_some(),
        is_stale: entry.data.is_some() && !entry.is_fresh(self.stale_time),
      },
      None => QuerySnapshot::default(),
    }
  }

  /// Marks `key` stale so its next read goes back to the network. The
  /// cached value stays available in the meantime.
  pub fn invalidate(&self, key: &str) {
    let mut entries = self.lock_entries();
    if let Some(entry) = entries.get_mut(key) {
      entry.fetched_at = None;
    }
  }

  /// Runs `future` as the fetch for `generation`, waits for it to settle,
  /// and returns the resulting state.
  async fn execute<Fut>(
    &self,
    key: &str,
    generation: u64,
    tx: watch::Sender<()>,
    mut rx: watch::Receiver<()>,
    future: Fut,
  ) -> QuerySnapshot<T>
  where
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let entries = Arc::clone(&self.entries);
    let entry_key = key.to_string();
    tokio::spawn(async move {
      let result = future.await;

      let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
      if let Some(entry) = entries.get_mut(&entry_key) {
        if entry.generation == generation {
          match result {
            Ok(value) => {
              entry.data = Some(value);
              entry.error = None;
              entry.fetched_at = Some(Instant::now());
            }
            Err(error) => {
              // Keep the last good value and its timestamp.
              debug!(key = %entry_key, %error, "fetch failed");
              entry.error = Some(error);
            }
          }
          entry.inflight = None;
        } else {
          debug!(key = %entry_key, generation, "discarding superseded fetch result");
        }
      }
      drop(entries);

      // Joiners may all be gone; that is fine.
      let _ = tx.send(());
    });

    let _ = rx.changed().await;
    self.snapshot(key)
  }

  /// Waits for the in-flight fetch behind `rx`, following any newer
  /// fetches that supersede it, and returns the settled state.
  async fn join(&self, key: &str, mut rx: watch::Receiver<()>) -> QuerySnapshot<T> {
    loop {
      let alive = rx.changed().await.is_ok();
      let next = {
        let entries = self.lock_entries();
        entries.get(key).and_then(|e| e.inflight.clone())
      };
      match next {
        // A sender dropped without reporting leaves its entry in flight;
        // stop waiting rather than spin on the closed channel.
        Some(later) if alive || !later.same_channel(&rx) => rx = later,
        _ => return self.snapshot(key),
      }
    }
  }

  fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry<T>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<T: Clone + Send + 'static> Default for QueryCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for QueryCache<T> {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
      stale_time: self.stale_time,
    }
  }
}

impl<T> std::fmt::Debug for QueryCache<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}
