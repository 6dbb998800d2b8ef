//! The account aggregate for the ledger context.
//!
//! `Account` is folded from history by [`apply_event`]; its decision methods
//! turn commands into candidate events without touching storage.

use annals_core::command::Command;
use annals_core::event::{EventRecord, NewEvent};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::commands::{CloseAccount, DepositFunds, OpenAccount, WithdrawFunds};
use super::events::{
    ACCOUNT_CLOSED, ACCOUNT_OPENED, AccountClosed, AccountOpened, FUNDS_DEPOSITED,
    FUNDS_WITHDRAWN, FundsDeposited, FundsWithdrawn, to_payload,
};
use crate::error::{LedgerError, ReplayError};

/// Lifecycle of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// No `AccountOpened` event yet.
    #[default]
    Unopened,
    /// Accepting deposits and withdrawals.
    Open,
    /// Closed for good.
    Closed,
}

/// State of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Account holder.
    pub owner: Option<String>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// Balance in minor units.
    pub balance: i64,
    /// Lifecycle status.
    pub status: AccountStatus,
}

fn decode<T: DeserializeOwned>(event: &EventRecord) -> Result<T, ReplayError> {
    T::deserialize(&event.payload).map_err(|source| ReplayError::Payload {
        event_type: event.event_type.clone(),
        source,
    })
}

fn overflow(event: &EventRecord, balance: i64, amount: i64) -> ReplayError {
    ReplayError::BalanceOverflow {
        event_type: event.event_type.clone(),
        balance,
        amount,
    }
}

/// Folds one account event into `state`.
///
/// # Errors
///
/// Returns `ReplayError` for payloads that do not decode, for event types
/// that do not belong to an account and for amounts the balance cannot hold.
pub fn apply_event(mut state: Account, event: &EventRecord) -> Result<Account, ReplayError> {
    match event.event_type.as_str() {
        ACCOUNT_OPENED => {
            let opened: AccountOpened = decode(event)?;
            state.owner = Some(opened.owner);
            state.currency = Some(opened.currency);
            state.status = AccountStatus::Open;
        }
        FUNDS_DEPOSITED => {
            let deposited: FundsDeposited = decode(event)?;
            state.balance = state
                .balance
                .checked_add(deposited.amount)
                .ok_or_else(|| overflow(event, state.balance, deposited.amount))?;
        }
        FUNDS_WITHDRAWN => {
            let withdrawn: FundsWithdrawn = decode(event)?;
            state.balance = state
                .balance
                .checked_sub(withdrawn.amount)
                .ok_or_else(|| overflow(event, state.balance, withdrawn.amount))?;
        }
        ACCOUNT_CLOSED => {
            let _: AccountClosed = decode(event)?;
            state.status = AccountStatus::Closed;
        }
        other => return Err(ReplayError::UnexpectedEventType(other.to_owned())),
    }
    Ok(state)
}

impl Account {
    fn ensure_open(&self, account_id: &str) -> Result<(), LedgerError> {
        match self.status {
            AccountStatus::Open => Ok(()),
            AccountStatus::Unopened => Err(LedgerError::AccountNotOpen(account_id.to_owned())),
            AccountStatus::Closed => Err(LedgerError::AccountClosed(account_id.to_owned())),
        }
    }

    /// Decides an `OpenAccount` command.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountAlreadyOpened` unless the account is new.
    pub fn open(&self, command: &OpenAccount) -> Result<Vec<NewEvent>, LedgerError> {
        if self.status != AccountStatus::Unopened {
            return Err(LedgerError::AccountAlreadyOpened(command.account_id.clone()));
        }
        let payload = AccountOpened {
            owner: command.owner.clone(),
            currency: command.currency.clone(),
        };
        Ok(vec![
            NewEvent::new(ACCOUNT_OPENED, to_payload(ACCOUNT_OPENED, &payload)?)
                .with_metadata(command.event_metadata()),
        ])
    }

    /// Decides a `DepositFunds` command.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the amount is not positive, the account is
    /// not open or the new balance would overflow.
    pub fn deposit(&self, command: &DepositFunds) -> Result<Vec<NewEvent>, LedgerError> {
        if command.amount <= 0 {
            return Err(LedgerError::InvalidAmount(command.amount));
        }
        self.ensure_open(&command.account_id)?;
        if self.balance.checked_add(command.amount).is_none() {
            return Err(LedgerError::BalanceOverflow {
                account_id: command.account_id.clone(),
                balance: self.balance,
                amount: command.amount,
            });
        }
        let payload = FundsDeposited {
            amount: command.amount,
        };
        Ok(vec![
            NewEvent::new(FUNDS_DEPOSITED, to_payload(FUNDS_DEPOSITED, &payload)?)
                .with_metadata(command.event_metadata()),
        ])
    }

    /// Decides a `WithdrawFunds` command.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientFunds` if the balance does not cover
    /// the amount, and the errors of [`deposit`](Self::deposit) otherwise.
    pub fn withdraw(&self, command: &WithdrawFunds) -> Result<Vec<NewEvent>, LedgerError> {
        if command.amount <= 0 {
            return Err(LedgerError::InvalidAmount(command.amount));
        }
        self.ensure_open(&command.account_id)?;
        if command.amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                account_id: command.account_id.clone(),
                balance: self.balance,
                requested: command.amount,
            });
        }
        let payload = FundsWithdrawn {
            amount: command.amount,
        };
        Ok(vec![
            NewEvent::new(FUNDS_WITHDRAWN, to_payload(FUNDS_WITHDRAWN, &payload)?)
                .with_metadata(command.event_metadata()),
        ])
    }

    /// Decides a `CloseAccount` command.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NonZeroBalance` while money remains, and
    /// `AccountNotOpen` / `AccountClosed` for accounts that are not open.
    pub fn close(&self, command: &CloseAccount) -> Result<Vec<NewEvent>, LedgerError> {
        self.ensure_open(&command.account_id)?;
        if self.balance != 0 {
            return Err(LedgerError::NonZeroBalance {
                account_id: command.account_id.clone(),
                balance: self.balance,
            });
        }
        let payload = AccountClosed {
            reason: command.reason.clone(),
        };
        Ok(vec![
            NewEvent::new(ACCOUNT_CLOSED, to_payload(ACCOUNT_CLOSED, &payload)?)
                .with_metadata(command.event_metadata()),
        ])
    }
}
