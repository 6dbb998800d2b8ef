//! Query handlers for the ledger context.
//!
//! This module contains query handlers that reconstruct accounts from their
//! history and return read-only view DTOs.

use annals_core::aggregate::{Aggregate, ReconstructOptions};
use annals_core::event::{EventRecord, NewEvent};
use annals_core::storage::{AggregateIdsPage, EventsQueryOptions, ListAggregateIdsOptions};
use annals_core::store::{EventStore, SimulationOptions};
use serde::Serialize;

use crate::domain::aggregates::{Account, AccountStatus, apply_event};
use crate::domain::events::ACCOUNT;
use crate::error::LedgerError;

/// Read-only view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    /// The account identifier.
    pub account_id: String,
    /// Account holder.
    pub owner: Option<String>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// Balance in minor units.
    pub balance: i64,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Version the view was folded at.
    pub version: i64,
}

impl From<Aggregate<Account>> for AccountView {
    fn from(aggregate: Aggregate<Account>) -> Self {
        Self {
            account_id: aggregate.aggregate_id,
            owner: aggregate.state.owner,
            currency: aggregate.state.currency,
            balance: aggregate.state.balance,
            status: aggregate.state.status,
            version: aggregate.version,
        }
    }
}

/// Retrieves an account by id.
///
/// # Errors
///
/// Returns `StoreError::AggregateNotFound` (as `LedgerError::Store`) if the
/// account has no events.
pub async fn get_account(account_id: &str, store: &EventStore) -> Result<AccountView, LedgerError> {
    let aggregate = store
        .get_existing_aggregate(account_id, ACCOUNT, apply_event, Account::default())
        .await?;
    Ok(aggregate.into())
}

/// Retrieves an account as it stood after event `version`.
///
/// # Errors
///
/// As [`get_account`].
pub async fn get_account_at(
    account_id: &str,
    version: i64,
    store: &EventStore,
) -> Result<AccountView, LedgerError> {
    let aggregate = store
        .reconstruct(
            account_id,
            ACCOUNT,
            apply_event,
            Account::default(),
            ReconstructOptions::default().up_to(version),
        )
        .await?;
    Ok(aggregate.into())
}

/// Returns an account's raw history within `options`.
///
/// # Errors
///
/// Returns `LedgerError::Store` if the store fails.
pub async fn get_account_history(
    account_id: &str,
    options: EventsQueryOptions,
    store: &EventStore,
) -> Result<Vec<EventRecord>, LedgerError> {
    Ok(store.query_all(account_id, ACCOUNT, options).await?)
}

/// Lists account ids one page at a time.
///
/// # Errors
///
/// Returns `LedgerError::Store` if the store fails.
pub async fn list_accounts(
    options: &ListAggregateIdsOptions,
    store: &EventStore,
) -> Result<AggregateIdsPage, LedgerError> {
    Ok(store.list_aggregate_ids(ACCOUNT, options).await?)
}

/// Previews a brand-new account built from `events` without persisting
/// anything.
///
/// # Errors
///
/// Returns `LedgerError::Store` if a candidate is invalid or does not fold.
pub fn preview_account(
    account_id: &str,
    events: &[NewEvent],
    store: &EventStore,
) -> Result<AccountView, LedgerError> {
    let aggregate = store.simulate_aggregate(
        account_id,
        ACCOUNT,
        events,
        apply_event,
        Account::default(),
        SimulationOptions::default(),
    )?;
    Ok(aggregate.into())
}
