//! Event types for the ledger context.
//!
//! `AccountOpened` is contracted by a schema document; the money movements
//! are contracted by Rust payload types with refinement checks.

use annals_core::error::{StoreError, ValidationIssue};
use annals_core::rng::DeterministicRng;
use annals_core::schema::{SchemaError, SchemaEventType};
use annals_core::store::EventStore;
use annals_core::typed::TypedEventType;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LedgerError;

/// Aggregate type of every ledger stream.
pub const ACCOUNT: &str = "account";

/// Registered name of [`AccountOpened`].
pub const ACCOUNT_OPENED: &str = "AccountOpened";
/// Registered name of [`FundsDeposited`].
pub const FUNDS_DEPOSITED: &str = "FundsDeposited";
/// Registered name of [`FundsWithdrawn`].
pub const FUNDS_WITHDRAWN: &str = "FundsWithdrawn";
/// Registered name of [`AccountClosed`].
pub const ACCOUNT_CLOSED: &str = "AccountClosed";

/// Currencies an account can be held in.
pub const CURRENCIES: [&str; 3] = ["EUR", "GBP", "USD"];

/// Emitted when an account is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    /// Account holder.
    pub owner: String,
    /// ISO currency code.
    pub currency: String,
}

/// Emitted when money is paid into an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsDeposited {
    /// Amount in minor units.
    pub amount: i64,
}

/// Emitted when money is paid out of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsWithdrawn {
    /// Amount in minor units.
    pub amount: i64,
}

/// Emitted when an empty account is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClosed {
    /// Free-form reason given by the holder.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Builds the `AccountOpened` event type from its schema document.
///
/// # Errors
///
/// Returns `SchemaError` if the document does not compile.
pub fn account_opened() -> Result<SchemaEventType, SchemaError> {
    SchemaEventType::new(
        ACCOUNT_OPENED,
        json!({
            "type": "object",
            "properties": {
                "owner": {"type": "string", "minLength": 1, "maxLength": 120},
                "currency": {"enum": CURRENCIES}
            },
            "required": ["owner", "currency"],
            "additionalProperties": false
        }),
    )
}

fn positive(amount: i64) -> Result<(), ValidationIssue> {
    if amount > 0 {
        Ok(())
    } else {
        Err(ValidationIssue::new("/amount", "must be positive"))
    }
}

fn sample_amount(rng: &mut dyn DeterministicRng) -> i64 {
    i64::from(rng.next_u32_range(1, 50_000))
}

/// Builds the `FundsDeposited` event type.
#[must_use]
pub fn funds_deposited() -> TypedEventType<FundsDeposited> {
    TypedEventType::new(FUNDS_DEPOSITED)
        .with_check(|p: &FundsDeposited| positive(p.amount))
        .with_sampler(|rng| FundsDeposited {
            amount: sample_amount(rng),
        })
}

/// Builds the `FundsWithdrawn` event type.
#[must_use]
pub fn funds_withdrawn() -> TypedEventType<FundsWithdrawn> {
    TypedEventType::new(FUNDS_WITHDRAWN)
        .with_check(|p: &FundsWithdrawn| positive(p.amount))
        .with_sampler(|rng| FundsWithdrawn {
            amount: sample_amount(rng),
        })
}

/// Builds the `AccountClosed` event type.
#[must_use]
pub fn account_closed() -> TypedEventType<AccountClosed> {
    TypedEventType::new(ACCOUNT_CLOSED)
        .with_check(|p: &AccountClosed| match &p.reason {
            Some(reason) if reason.trim().is_empty() => {
                Err(ValidationIssue::new("/reason", "must not be blank"))
            }
            _ => Ok(()),
        })
        .with_sampler(|rng| AccountClosed {
            reason: rng.next_bool().then(|| "moving banks".to_owned()),
        })
}

/// Registers every ledger event type on `store`.
///
/// # Errors
///
/// Returns `LedgerError::Store` if a name is already registered.
pub fn register_event_types(store: &mut EventStore) -> Result<(), LedgerError> {
    store.register_event_type(account_opened()?)?;
    store.register_event_type(funds_deposited())?;
    store.register_event_type(funds_withdrawn())?;
    store.register_event_type(account_closed())?;
    Ok(())
}

/// Serializes a payload struct into an event payload.
pub(crate) fn to_payload<T: Serialize>(
    event_type: &str,
    payload: &T,
) -> Result<serde_json::Value, LedgerError> {
    serde_json::to_value(payload).map_err(|e| {
        LedgerError::Store(StoreError::InvalidArgument(format!(
            "cannot encode {event_type} payload: {e}"
        )))
    })
}
