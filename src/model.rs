//! Wire-level data model for the rental resource server.
//!
//! The server is a generic JSON collection store and every payload is
//! camelCase JSON. Ids are canonically strings, but older datasets carry
//! numeric ids, so deserialization accepts either form and normalizes to
//! a string.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Accepts `"7"` or `7` and yields `"7"`.
fn id_compat<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum IdRepr {
    Text(String),
    Num(i64),
  }

  Ok(match IdRepr::deserialize(deserializer)? {
    IdRepr::Text(s) => s,
    IdRepr::Num(n) => n.to_string(),
  })
}

/// A rentable property as served by `GET /properties`.
///
/// Read-only from the client's perspective; the remote store owns these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
  #[serde(deserialize_with = "id_compat")]
  pub id: String,
  pub name: String,
  pub location: String,
  pub price_per_night: f64,
  pub rating: f64,
  pub description: String,
  #[serde(default)]
  pub image_url: String,
  #[serde(default)]
  pub features: Vec<String>,
}

/// Lifecycle states the server tracks for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
  Confirmed,
  Pending,
  Cancelled,
}

impl BookingStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      BookingStatus::Confirmed => "confirmed",
      BookingStatus::Pending => "pending",
      BookingStatus::Cancelled => "cancelled",
    }
  }
}

impl Default for BookingStatus {
  // Datasets predating the status column treat every row as confirmed.
  fn default() -> Self {
    BookingStatus::Confirmed
  }
}

impl std::fmt::Display for BookingStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A booking row as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
  #[serde(deserialize_with = "id_compat")]
  pub id: String,
  #[serde(deserialize_with = "id_compat")]
  pub property_id: String,
  #[serde(deserialize_with = "id_compat")]
  pub user_id: String,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub total_price: f64,
  #[serde(default)]
  pub status: BookingStatus,
}

/// Payload for `POST /bookings`. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
  pub property_id: String,
  pub user_id: String,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub total_price: f64,
  pub status: BookingStatus,
}

/// User input for a new booking, prior to validation.
///
/// `guests` is checked locally but never sent; the bookings collection
/// does not store it.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
  pub property_id: String,
  pub user_id: String,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub guests: u32,
  pub total_price: f64,
}

impl BookingDraft {
  /// Checks the domain constraints the booking form enforces.
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.end_date <= self.start_date {
      return Err(ValidationError::EndNotAfterStart);
    }
    if self.guests < 1 {
      return Err(ValidationError::NoGuests);
    }
    Ok(())
  }

  /// Wire payload for the create call. New bookings are submitted as
  /// confirmed; the collection server runs no approval step of its own.
  pub fn to_new_booking(&self) -> NewBooking {
    NewBooking {
      property_id: self.property_id.clone(),
      user_id: self.user_id.clone(),
      start_date: self.start_date,
      end_date: self.end_date,
      total_price: self.total_price,
      status: BookingStatus::Confirmed,
    }
  }
}

/// Profile data for the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(deserialize_with = "id_compat")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar: Option<String>,
}

impl User {
  /// Placeholder profile shown until the remote one is available.
  pub fn guest() -> Self {
    User {
      id: "user-123".to_string(),
      name: "Guest User".to_string(),
      email: "guest@example.com".to_string(),
      avatar: None,
    }
  }
}

/// Number of nights covered by a date range. Zero when the range is empty
/// or inverted.
pub fn nights(start: NaiveDate, end: NaiveDate) -> i64 {
  (end - start).num_days().max(0)
}

/// Total price for a stay: nightly rate times number of nights.
pub fn quote_total(price_per_night: f64, start: NaiveDate, end: NaiveDate) -> f64 {
  price_per_night * nights(start, end) as f64
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
  }

  fn draft() -> BookingDraft {
    BookingDraft {
      property_id: "1".to_string(),
      user_id: "1".to_string(),
      start_date: date("2025-07-01"),
      end_date: date("2025-07-03"),
      guests: 2,
      total_price: 240.0,
    }
  }

  #[test]
  fn test_property_accepts_numeric_and_string_ids() {
    let numeric: Property = serde_json::from_value(serde_json::json!({
      "id": 7,
      "name": "Loft",
      "location": "Lisbon",
      "pricePerNight": 120.0,
      "rating": 4.5,
      "description": "Bright loft near the river"
    }))
    .unwrap();
    assert_eq!(numeric.id, "7");
    assert!(numeric.features.is_empty());

    let text: Property = serde_json::from_value(serde_json::json!({
      "id": "7",
      "name": "Loft",
      "location": "Lisbon",
      "pricePerNight": 120.0,
      "rating": 4.5,
      "description": "Bright loft near the river",
      "imageUrl": "https://example.com/loft.jpg",
      "features": ["wifi", "kitchen"]
    }))
    .unwrap();
    assert_eq!(text.id, "7");
    assert_eq!(text.features.len(), 2);
  }

  #[test]
  fn test_booking_round_trips_camel_case() {
    let booking = Booking {
      id: "12".to_string(),
      property_id: "1".to_string(),
      user_id: "1".to_string(),
      start_date: date("2025-07-01"),
      end_date: date("2025-07-03"),
      total_price: 240.0,
      status: BookingStatus::Confirmed,
    };
    let value = serde_json::to_value(&booking).unwrap();
    assert_eq!(value["propertyId"], "1");
    assert_eq!(value["startDate"], "2025-07-01");
    assert_eq!(value["status"], "confirmed");

    let back: Booking = serde_json::from_value(value).unwrap();
    assert_eq!(back, booking);
  }

  #[test]
  fn test_booking_status_defaults_to_confirmed() {
    let booking: Booking = serde_json::from_value(serde_json::json!({
      "id": 3,
      "propertyId": 1,
      "userId": 1,
      "startDate": "2025-07-01",
      "endDate": "2025-07-04",
      "totalPrice": 360.0
    }))
    .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
  }

  #[test]
  fn test_draft_rejects_inverted_range() {
    let mut d = draft();
    d.end_date = d.start_date;
    assert_eq!(d.validate(), Err(ValidationError::EndNotAfterStart));

    d.end_date = date("2025-06-30");
    assert_eq!(d.validate(), Err(ValidationError::EndNotAfterStart));
  }

  #[test]
  fn test_draft_rejects_zero_guests() {
    let mut d = draft();
    d.guests = 0;
    assert_eq!(d.validate(), Err(ValidationError::NoGuests));
  }

  #[test]
  fn test_valid_draft_submits_as_confirmed_without_guests() {
    let d = draft();
    assert_eq!(d.validate(), Ok(()));

    let payload = serde_json::to_value(d.to_new_booking()).unwrap();
    assert_eq!(payload["status"], "confirmed");
    assert!(payload.get("guests").is_none());
    assert!(payload.get("id").is_none());
  }

  #[test]
  fn test_quote_total_is_rate_times_nights() {
    assert_eq!(nights(date("2025-07-01"), date("2025-07-03")), 2);
    assert_eq!(nights(date("2025-07-03"), date("2025-07-01")), 0);
    assert_eq!(
      quote_total(120.0, date("2025-07-01"), date("2025-07-04")),
      360.0
    );
  }
}
