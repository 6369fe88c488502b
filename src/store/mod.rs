//! Local booking state: optimistic adds, rollback, and durable
//! persistence across restarts.

mod bookings;
mod optimistic;
mod storage;

pub use bookings::LocalBookingStore;
pub use optimistic::{LocalBooking, SyncState};
pub use storage::{BookingStorage, MemoryStorage, SqliteStorage};
