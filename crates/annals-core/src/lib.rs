//! Annals Core: the event-sourcing storage engine.
//!
//! Events are immutable, append-only facts grouped by aggregate. This crate
//! validates payloads against registered event types, appends them with
//! optimistic concurrency through a pluggable [`StorageAdapter`], replays
//! histories, and folds them into aggregate state. It contains no
//! backend-specific code beyond the in-memory reference adapter.
//!
//! [`StorageAdapter`]: storage::StorageAdapter

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod event_type;
pub mod memory;
pub mod registry;
pub mod rng;
pub mod schema;
pub mod storage;
pub mod store;
pub mod typed;
