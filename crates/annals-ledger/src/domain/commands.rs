//! Commands for the ledger context.

use annals_core::command::Command;
use uuid::Uuid;

/// Command to open a new account.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account to open.
    pub account_id: String,
    /// Account holder.
    pub owner: String,
    /// ISO currency code.
    pub currency: String,
}

/// Command to pay money into an account.
#[derive(Debug, Clone)]
pub struct DepositFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The target account.
    pub account_id: String,
    /// Amount in minor units.
    pub amount: i64,
}

/// Command to pay money out of an account.
#[derive(Debug, Clone)]
pub struct WithdrawFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The source account.
    pub account_id: String,
    /// Amount in minor units.
    pub amount: i64,
}

/// Command to close an empty account.
#[derive(Debug, Clone)]
pub struct CloseAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account to close.
    pub account_id: String,
    /// Optional reason.
    pub reason: Option<String>,
}

impl Command for OpenAccount {
    fn command_type(&self) -> &'static str {
        "ledger.open_account"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for DepositFunds {
    fn command_type(&self) -> &'static str {
        "ledger.deposit_funds"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for WithdrawFunds {
    fn command_type(&self) -> &'static str {
        "ledger.withdraw_funds"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for CloseAccount {
    fn command_type(&self) -> &'static str {
        "ledger.close_account"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
