//! Annals ledger demo entry point.
//!
//! Runs a short account lifecycle against PostgreSQL when `DATABASE_URL` is
//! set, and against the in-memory adapter otherwise.

use std::error::Error;
use std::sync::Arc;

use annals_core::config::EventStoreConfig;
use annals_core::event::NewEvent;
use annals_core::memory::InMemoryStorageAdapter;
use annals_core::storage::{EventsQueryOptions, StorageAdapter};
use annals_core::store::EventStore;
use annals_ledger::application::command_handlers::{
    handle_deposit_funds, handle_open_account, handle_withdraw_funds,
};
use annals_ledger::application::query_handlers::{
    get_account, get_account_history, preview_account,
};
use annals_ledger::domain::commands::{DepositFunds, OpenAccount, WithdrawFunds};
use annals_ledger::domain::events::{ACCOUNT_OPENED, FUNDS_WITHDRAWN, register_event_types};
use annals_postgres::{PgConfig, PgStorageAdapter};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

async fn storage_adapter() -> Result<Arc<dyn StorageAdapter>, Box<dyn Error>> {
    if std::env::var_os("DATABASE_URL").is_none() {
        tracing::info!("DATABASE_URL not set, using in-memory storage");
        return Ok(Arc::new(InMemoryStorageAdapter::new()));
    }
    let config = PgConfig::from_env()?;
    let adapter = PgStorageAdapter::connect(&config).await?;
    adapter.migrate().await?;
    Ok(Arc::new(adapter))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Annals ledger demo");

    // Read configuration from environment.
    let config = EventStoreConfig::from_env()?;

    let mut store = EventStore::new(storage_adapter().await?).with_config(config);
    register_event_types(&mut store)?;

    let account_id = format!("acc-{}", Uuid::new_v4());
    let correlation_id = Uuid::new_v4();

    handle_open_account(
        &OpenAccount {
            correlation_id,
            account_id: account_id.clone(),
            owner: "Ada Lovelace".to_owned(),
            currency: "GBP".to_owned(),
        },
        &store,
    )
    .await?;
    handle_deposit_funds(
        &DepositFunds {
            correlation_id,
            account_id: account_id.clone(),
            amount: 12_500,
        },
        &store,
    )
    .await?;
    handle_withdraw_funds(
        &WithdrawFunds {
            correlation_id,
            account_id: account_id.clone(),
            amount: 2_000,
        },
        &store,
    )
    .await?;

    let account = get_account(&account_id, &store).await?;
    tracing::info!(account = %serde_json::to_string(&account)?, "account reconstructed");

    let history = get_account_history(&account_id, EventsQueryOptions::all(), &store).await?;
    for record in &history {
        tracing::info!(
            sequence_number = record.sequence_number,
            event_type = %record.event_type,
            payload = %record.payload,
            "history"
        );
    }

    // Overdrawing is refused by the command handler; a preview shows the
    // arithmetic without writing anything.
    let preview = preview_account(
        "preview",
        &[
            NewEvent::new(
                ACCOUNT_OPENED,
                json!({"owner": "Ada Lovelace", "currency": "GBP"}),
            ),
            NewEvent::new(FUNDS_WITHDRAWN, json!({"amount": 500})),
        ],
        &store,
    )?;
    tracing::info!(balance = preview.balance, "preview of an overdrawn account");

    Ok(())
}
