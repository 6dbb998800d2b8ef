//! Command handlers for the ledger context.
//!
//! Each handler reconstructs the account, decides the command against it and
//! appends the resulting events at the version it read. A concurrent writer
//! surfaces as `StoreError::ConcurrencyConflict`; handlers do not retry.

use annals_core::command::Command;
use annals_core::event::NewEvent;
use annals_core::storage::AppendOutcome;
use annals_core::store::EventStore;

use crate::domain::aggregates::{Account, apply_event};
use crate::domain::commands::{CloseAccount, DepositFunds, OpenAccount, WithdrawFunds};
use crate::domain::events::ACCOUNT;
use crate::error::LedgerError;

async fn execute<C, D>(
    store: &EventStore,
    command: &C,
    account_id: &str,
    decide: D,
) -> Result<AppendOutcome, LedgerError>
where
    C: Command,
    D: FnOnce(&Account) -> Result<Vec<NewEvent>, LedgerError>,
{
    let account = store
        .get_aggregate(account_id, ACCOUNT, apply_event, Account::default())
        .await?;
    let events = decide(&account.state)?;
    let outcome = store
        .append(account_id, ACCOUNT, account.version, events)
        .await?;
    tracing::info!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        account_id,
        new_version = outcome.new_version,
        "command handled"
    );
    Ok(outcome)
}

/// Handles the `OpenAccount` command.
///
/// # Errors
///
/// Returns `LedgerError::AccountAlreadyOpened` for an existing account and
/// `LedgerError::Store` if reconstruction or the append fails.
pub async fn handle_open_account(
    command: &OpenAccount,
    store: &EventStore,
) -> Result<AppendOutcome, LedgerError> {
    execute(store, command, &command.account_id, |account| {
        account.open(command)
    })
    .await
}

/// Handles the `DepositFunds` command.
///
/// # Errors
///
/// Returns `LedgerError` if the account cannot take the deposit or the store
/// fails.
pub async fn handle_deposit_funds(
    command: &DepositFunds,
    store: &EventStore,
) -> Result<AppendOutcome, LedgerError> {
    execute(store, command, &command.account_id, |account| {
        account.deposit(command)
    })
    .await
}

/// Handles the `WithdrawFunds` command.
///
/// # Errors
///
/// Returns `LedgerError::InsufficientFunds` when the balance is too low, and
/// otherwise as [`handle_deposit_funds`].
pub async fn handle_withdraw_funds(
    command: &WithdrawFunds,
    store: &EventStore,
) -> Result<AppendOutcome, LedgerError> {
    execute(store, command, &command.account_id, |account| {
        account.withdraw(command)
    })
    .await
}

/// Handles the `CloseAccount` command.
///
/// # Errors
///
/// Returns `LedgerError::NonZeroBalance` while money remains, and otherwise
/// as [`handle_deposit_funds`].
pub async fn handle_close_account(
    command: &CloseAccount,
    store: &EventStore,
) -> Result<AppendOutcome, LedgerError> {
    execute(store, command, &command.account_id, |account| {
        account.close(command)
    })
    .await
}
