//! Error types shared across the data layer.

use thiserror::Error;

/// Result alias for data-layer operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A named remote collection on the resource server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
  Properties,
  Bookings,
  Users,
}

impl Resource {
  /// Collection path segment on the resource server.
  pub fn as_str(&self) -> &'static str {
    match self {
      Resource::Properties => "properties",
      Resource::Bookings => "bookings",
      Resource::Users => "users",
    }
  }
}

impl std::fmt::Display for Resource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Booking draft violations, caught before any network call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
  /// The date range is empty or inverted.
  #[error("check-out date must be after check-in date")]
  EndNotAfterStart,
  /// Guest count below one.
  #[error("number of guests must be at least 1")]
  NoGuests,
}

/// Errors surfaced by the data layer.
///
/// Clone + PartialEq so an error can be retained inside cache entries and
/// the booking store's error field, and asserted against in tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  /// Transport failure or non-2xx response from the resource server.
  #[error("remote request failed: {message}")]
  Remote { status: Option<u16>, message: String },

  /// The requested id does not exist in the collection (404).
  #[error("{resource} {id} not found")]
  NotFound { resource: Resource, id: String },

  /// Local input failed domain constraints; nothing was sent.
  #[error("invalid booking: {0}")]
  Validation(#[from] ValidationError),

  /// Local persistence failure.
  #[error("storage error: {0}")]
  Storage(String),

  /// Configuration could not be read or parsed.
  #[error("config error: {0}")]
  Config(String),
}

impl Error {
  /// Transport-level failure with no HTTP status.
  pub fn remote(message: impl Into<String>) -> Self {
    Error::Remote {
      status: None,
      message: message.into(),
    }
  }

  /// Non-2xx response.
  pub fn remote_status(status: u16, message: impl Into<String>) -> Self {
    Error::Remote {
      status: Some(status),
      message: message.into(),
    }
  }

  /// Promote a 404 into a typed NotFound for detail endpoints.
  pub(crate) fn or_not_found(self, resource: Resource, id: &str) -> Self {
    match self {
      Error::Remote {
        status: Some(404), ..
      } => Error::NotFound {
        resource,
        id: id.to_string(),
      },
      other => other,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound { .. })
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, Error::Validation(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_404_maps_to_not_found() {
    let err = Error::remote_status(404, "Not Found").or_not_found(Resource::Properties, "9");
    assert_eq!(
      err,
      Error::NotFound {
        resource: Resource::Properties,
        id: "9".to_string()
      }
    );
  }

  #[test]
  fn test_other_statuses_stay_remote() {
    let err = Error::remote_status(500, "boom").or_not_found(Resource::Properties, "9");
    assert_eq!(
      err,
      Error::Remote {
        status: Some(500),
        message: "boom".to_string()
      }
    );
  }

  #[test]
  fn test_transport_errors_stay_remote() {
    let err = Error::remote("connection refused").or_not_found(Resource::Users, "1");
    assert!(matches!(err, Error::Remote { status: None, .. }));
  }
}
