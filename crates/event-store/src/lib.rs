//! # Event Store Crate
//!
//! Events, registrations and the flat JSON file they are persisted in.
//!
//! ## Main Components
//!
//! - **types**: Domain types (Event, Registration, Stats) and date parsing
//! - **store**: `EventStore`, the async handle over the JSON database
//! - **seed**: Demo catalogue for empty databases
//! - **error**: Error types for store operations
//!
//! ## Example Usage
//!
//! ```ignore
//! use event_store::{EventStore, NewRegistration};
//!
//! let store = EventStore::open("db.json").await?;
//! let events = store.list_events().await;
//!
//! let (registration, event) = store
//!     .register(NewRegistration { /* ... */ }, chrono::Utc::now())
//!     .await?;
//! ```

pub mod error;
pub mod seed;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::{EventStore, SeedOutcome, generate_id};
pub use types::{
    Database, Event, EventId, ExtraFields, NewRegistration, Registration, RegistrationId, Stats,
    parse_event_date,
};
