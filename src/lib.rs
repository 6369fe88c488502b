//! # staysync
//!
//! Client-side data layer for a property rental service.
//!
//! Reads go through per-query caches with stale-while-revalidate
//! semantics, inspired by TanStack Query. Booking writes are applied
//! optimistically to a local store that survives restarts, then
//! reconciled against the server.
//!
//! ## Example
//!
//! ```ignore
//! use staysync::{CachedClient, Config};
//!
//! let config = Config::load(None)?;
//! let client = CachedClient::new(&config)?;
//!
//! let properties = client.properties(Some("beach")).await;
//! let booking = client.book(&draft).await?;
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod search;
pub mod store;

pub use api::{MockApi, RentalApi, RestApi};
pub use client::{CachedClient, QueryKey};
pub use config::Config;
pub use error::{Error, Resource, Result, ValidationError};
pub use model::{Booking, BookingDraft, BookingStatus, NewBooking, Property, User};
pub use query::{QueryCache, QuerySnapshot};
pub use search::filter_properties;
pub use store::{
  BookingStorage, LocalBooking, LocalBookingStore, MemoryStorage, SqliteStorage, SyncState,
};
