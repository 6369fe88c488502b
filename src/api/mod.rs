//! Remote access to the rental resource server.
//!
//! [`RentalApi`] is the transport boundary: every call issues exactly one
//! network request, non-2xx responses become typed errors, and nothing is
//! retried or cached here. Staleness and retry policy live in the layers
//! on top.

mod mock;
mod rest;

pub use mock::MockApi;
pub use rest::RestApi;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Booking, NewBooking, Property, User};

/// CRUD surface of the rental collection server.
#[async_trait]
pub trait RentalApi: Send + Sync {
  /// All properties, optionally narrowed by the server-side `?q=` search.
  async fn list_properties(&self, search: Option<&str>) -> Result<Vec<Property>>;

  /// One property by id. A 404 surfaces as [`Error::NotFound`].
  ///
  /// [`Error::NotFound`]: crate::error::Error::NotFound
  async fn get_property(&self, id: &str) -> Result<Property>;

  /// All bookings belonging to one user.
  async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>>;

  /// Creates a booking. The server assigns the id and echoes the row back.
  async fn create_booking(&self, booking: &NewBooking) -> Result<Booking>;

  /// One user profile by id. A 404 surfaces as [`Error::NotFound`].
  ///
  /// [`Error::NotFound`]: crate::error::Error::NotFound
  async fn get_user(&self, id: &str) -> Result<User>;
}
