//! In-memory [`RentalApi`] for tests.
//!
//! Allows seeding collections, forcing failures, slowing calls down, and
//! capturing every call made for verification.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Resource, Result};
use crate::model::{Booking, NewBooking, Property, User};
use crate::search;

use super::RentalApi;

/// Mock rental server for testing.
///
/// Clones share state, so a test can hold one handle for assertions while
/// the code under test owns another.
#[derive(Debug, Default)]
pub struct MockApi {
  inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug)]
struct MockApiInner {
  properties: Vec<Property>,
  bookings: Vec<Booking>,
  users: Vec<User>,
  next_booking_id: u64,
  calls: Vec<String>,
  fail_next: Option<Error>,
  delay: Option<Duration>,
}

impl Default for MockApiInner {
  fn default() -> Self {
    Self {
      properties: Vec::new(),
      bookings: Vec::new(),
      users: Vec::new(),
      // Server-assigned ids start high so they never collide with seeds.
      next_booking_id: 101,
      calls: Vec::new(),
      fail_next: None,
      delay: None,
    }
  }
}

impl MockApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn seed_properties(&self, properties: Vec<Property>) {
    self.inner.lock().unwrap().properties = properties;
  }

  pub fn seed_bookings(&self, bookings: Vec<Booking>) {
    self.inner.lock().unwrap().bookings = bookings;
  }

  pub fn seed_users(&self, users: Vec<User>) {
    self.inner.lock().unwrap().users = users;
  }

  /// Causes the next call (only) to fail with `error`.
  pub fn fail_next(&self, error: Error) {
    self.inner.lock().unwrap().fail_next = Some(error);
  }

  /// Makes every call sleep before answering, to let tests overlap
  /// in-flight requests.
  pub fn set_delay(&self, delay: Duration) {
    self.inner.lock().unwrap().delay = Some(delay);
  }

  /// All calls made so far, e.g. `"get_property/7"`.
  pub fn calls(&self) -> Vec<String> {
    self.inner.lock().unwrap().calls.clone()
  }

  pub fn call_count(&self) -> usize {
    self.inner.lock().unwrap().calls.len()
  }

  /// Current server-side bookings, including rows added via create.
  pub fn bookings(&self) -> Vec<Booking> {
    self.inner.lock().unwrap().bookings.clone()
  }

  /// Records the call, applies any configured delay, then pops a forced
  /// failure if one was set.
  async fn begin(&self, call: String) -> Result<()> {
    let (delay, failure) = {
      let mut inner = self.inner.lock().unwrap();
      inner.calls.push(call);
      (inner.delay, inner.fail_next.take())
    };

    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    match failure {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

impl Clone for MockApi {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

#[async_trait]
impl RentalApi for MockApi {
  async fn list_properties(&self, search: Option<&str>) -> Result<Vec<Property>> {
    let call = match search {
      Some(q) => format!("list_properties?q={q}"),
      None => "list_properties".to_string(),
    };
    self.begin(call).await?;

    let properties = self.inner.lock().unwrap().properties.clone();
    match search {
      Some(q) => Ok(
        search::filter_properties(&properties, q)
          .into_iter()
          .cloned()
          .collect(),
      ),
      None => Ok(properties),
    }
  }

  async fn get_property(&self, id: &str) -> Result<Property> {
    self.begin(format!("get_property/{id}")).await?;

    let inner = self.inner.lock().unwrap();
    inner
      .properties
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or_else(|| Error::NotFound {
        resource: Resource::Properties,
        id: id.to_string(),
      })
  }

  async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
    self.begin(format!("bookings_for_user/{user_id}")).await?;

    let inner = self.inner.lock().unwrap();
    Ok(
      inner
        .bookings
        .iter()
        .filter(|b| b.user_id == user_id)
        .cloned()
        .collect(),
    )
  }

  async fn create_booking(&self, booking: &NewBooking) -> Result<Booking> {
    self.begin("create_booking".to_string()).await?;

    let mut inner = self.inner.lock().unwrap();
    let id = inner.next_booking_id;
    inner.next_booking_id += 1;

    let created = Booking {
      id: id.to_string(),
      property_id: booking.property_id.clone(),
      user_id: booking.user_id.clone(),
      start_date: booking.start_date,
      end_date: booking.end_date,
      total_price: booking.total_price,
      status: booking.status,
    };
    inner.bookings.push(created.clone());
    Ok(created)
  }

  async fn get_user(&self, id: &str) -> Result<User> {
    self.begin(format!("get_user/{id}")).await?;

    let inner = self.inner.lock().unwrap();
    inner
      .users
      .iter()
      .find(|u| u.id == id)
      .cloned()
      .ok_or_else(|| Error::NotFound {
        resource: Resource::Users,
        id: id.to_string(),
      })
  }
}
