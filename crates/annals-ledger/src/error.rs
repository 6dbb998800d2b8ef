//! Error types for the ledger context.

use annals_core::error::StoreError;
use annals_core::schema::SchemaError;
use thiserror::Error;

/// Errors returned by ledger command and query handlers.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account has never been opened.
    #[error("account not open: {0}")]
    AccountNotOpen(String),

    /// An open command targeted an existing account.
    #[error("account already opened: {0}")]
    AccountAlreadyOpened(String),

    /// The account was closed and accepts no further changes.
    #[error("account closed: {0}")]
    AccountClosed(String),

    /// Amounts are positive minor units.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// A withdrawal exceeds the balance.
    #[error("insufficient funds in {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// The account.
        account_id: String,
        /// Balance before the withdrawal.
        balance: i64,
        /// Requested amount.
        requested: i64,
    },

    /// A deposit would take the balance past the representable maximum.
    #[error("deposit of {amount} into {account_id} would overflow balance {balance}")]
    BalanceOverflow {
        /// The account.
        account_id: String,
        /// Balance before the deposit.
        balance: i64,
        /// Requested amount.
        amount: i64,
    },

    /// Only empty accounts can be closed.
    #[error("account {account_id} still holds {balance}")]
    NonZeroBalance {
        /// The account.
        account_id: String,
        /// Remaining balance.
        balance: i64,
    },

    /// A built-in event schema failed to compile.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The event store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while folding account history.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A stored payload does not match its event type.
    #[error("malformed {event_type} payload: {source}")]
    Payload {
        /// The record's event type.
        event_type: String,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The history holds an event type accounts do not understand.
    #[error("unexpected event type in account history: {0}")]
    UnexpectedEventType(String),

    /// Applying an amount took the balance out of range.
    #[error("balance {balance} cannot absorb {event_type} of {amount}")]
    BalanceOverflow {
        /// The record's event type.
        event_type: String,
        /// Balance before the event.
        balance: i64,
        /// The event's amount.
        amount: i64,
    },
}
