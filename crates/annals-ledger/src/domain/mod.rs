//! Domain layer for the ledger context.

pub mod aggregates;
pub mod commands;
pub mod events;
