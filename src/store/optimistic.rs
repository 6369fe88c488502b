//! Pure transitions for the optimistic booking list.
//!
//! Each local entry is tagged with its relation to the server: a
//! placeholder awaiting confirmation, or a row the server owns. The
//! transitions here are plain functions over the entry list so they can
//! be tested independent of network timing.

use serde::{Deserialize, Serialize};

use crate::model::Booking;

/// How a local entry relates to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncState {
  /// Awaiting server confirmation; `temp_id` is the locally generated
  /// placeholder id.
  #[serde(rename_all = "camelCase")]
  Pending { temp_id: String },
  /// The server assigned this row its id.
  Confirmed,
}

/// One booking as held locally, tagged with its sync state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalBooking {
  pub booking: Booking,
  pub sync: SyncState,
}

impl LocalBooking {
  pub fn is_pending(&self) -> bool {
    matches!(self.sync, SyncState::Pending { .. })
  }

  pub fn id(&self) -> &str {
    &self.booking.id
  }
}

/// Appends a placeholder entry for a draft that passed validation. The
/// placeholder carries its temporary id as the booking id.
pub(crate) fn insert_pending(entries: &mut Vec<LocalBooking>, placeholder: Booking) {
  let temp_id = placeholder.id.clone();
  entries.push(LocalBooking {
    booking: placeholder,
    sync: SyncState::Pending { temp_id },
  });
}

/// Replaces the placeholder identified by `temp_id` with the confirmed
/// server row, matched by the temporary-id association rather than by
/// content.
///
/// If a fetch landed mid-create the server row may already be present;
/// exactly one entry per id remains either way.
pub(crate) fn confirm(entries: &mut Vec<LocalBooking>, temp_id: &str, confirmed: Booking) {
  let matches = |e: &LocalBooking| {
    e.booking.id == confirmed.id
      || matches!(&e.sync, SyncState::Pending { temp_id: t } if t == temp_id)
  };

  let position = entries
    .iter()
    .position(|e| matches(e))
    .unwrap_or(entries.len());
  entries.retain(|e| !matches(e));
  entries.insert(
    position.min(entries.len()),
    LocalBooking {
      booking: confirmed,
      sync: SyncState::Confirmed,
    },
  );
}

/// Removes the placeholder for a failed create, leaving everything else
/// untouched.
pub(crate) fn rollback(entries: &mut Vec<LocalBooking>, temp_id: &str) {
  entries.retain(|e| !matches!(&e.sync, SyncState::Pending { temp_id: t } if t == temp_id));
}

/// Replaces confirmed rows with the server's list while keeping
/// placeholders that are still awaiting confirmation.
pub(crate) fn reconcile_with_server(entries: &mut Vec<LocalBooking>, server: Vec<Booking>) {
  let pendings: Vec<LocalBooking> = entries.iter().filter(|e| e.is_pending()).cloned().collect();
  entries.clear();
  entries.extend(server.into_iter().map(|booking| LocalBooking {
    booking,
    sync: SyncState::Confirmed,
  }));
  entries.extend(pendings);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BookingStatus;
  use chrono::NaiveDate;

  fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
  }

  fn booking(id: &str) -> Booking {
    Booking {
      id: id.to_string(),
      property_id: "1".to_string(),
      user_id: "1".to_string(),
      start_date: date("2025-07-01"),
      end_date: date("2025-07-03"),
      total_price: 240.0,
      status: BookingStatus::Confirmed,
    }
  }

  fn pending(temp_id: &str) -> LocalBooking {
    LocalBooking {
      booking: Booking {
        status: BookingStatus::Pending,
        ..booking(temp_id)
      },
      sync: SyncState::Pending {
        temp_id: temp_id.to_string(),
      },
    }
  }

  fn confirmed(id: &str) -> LocalBooking {
    LocalBooking {
      booking: booking(id),
      sync: SyncState::Confirmed,
    }
  }

  #[test]
  fn test_confirm_replaces_placeholder_in_place() {
    let mut entries = vec![confirmed("1"), pending("temp-a"), confirmed("2")];

    confirm(&mut entries, "temp-a", booking("42"));

    let ids: Vec<&str> = entries.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec!["1", "42", "2"]);
    assert!(!entries[1].is_pending());
  }

  #[test]
  fn test_confirm_without_placeholder_upserts_by_id() {
    let mut entries = vec![confirmed("1")];

    confirm(&mut entries, "temp-gone", booking("42"));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].id(), "42");

    // Confirming the same id again updates rather than duplicates.
    confirm(&mut entries, "temp-gone", booking("42"));
    assert_eq!(entries.len(), 2);
  }

  #[test]
  fn test_confirm_deduplicates_row_fetched_mid_create() {
    // A reconcile that ran while the create was in flight already
    // brought in the server row next to the placeholder.
    let mut entries = vec![confirmed("42"), pending("temp-a")];

    confirm(&mut entries, "temp-a", booking("42"));

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id(), "42");
    assert!(!entries[0].is_pending());
  }

  #[test]
  fn test_rollback_removes_only_the_placeholder() {
    let mut entries = vec![confirmed("1"), pending("temp-a"), pending("temp-b")];

    rollback(&mut entries, "temp-a");

    let ids: Vec<&str> = entries.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec!["1", "temp-b"]);
  }

  #[test]
  fn test_reconcile_with_server_adopts_list_and_keeps_pendings() {
    let mut entries = vec![confirmed("1"), confirmed("2"), pending("temp-a")];

    reconcile_with_server(&mut entries, vec![booking("2"), booking("3")]);

    let ids: Vec<&str> = entries.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec!["2", "3", "temp-a"]);
    assert!(entries[2].is_pending());
  }

  #[test]
  fn test_sync_state_round_trips_as_json() {
    let entry = pending("temp-a");
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["sync"]["state"], "pending");
    assert_eq!(value["sync"]["tempId"], "temp-a");

    let back: LocalBooking = serde_json::from_value(value).unwrap();
    assert_eq!(back, entry);
  }
}
