//! Annals Ledger: bank accounts on top of the event store.
//!
//! Responsible for opening and closing accounts and for moving funds in and
//! out of them. Every state change is an event appended through
//! `annals_core::store::EventStore`; balances are never stored, only folded.

pub mod application;
pub mod domain;
pub mod error;
