//! End-to-end tests for `EventStore` against the shared test doubles.

use std::sync::Arc;

use annals_core::aggregate::ReconstructOptions;
use annals_core::config::EventStoreConfig;
use annals_core::error::{StorageError, StoreError, ValidationIssue};
use annals_core::event::{AggregateKey, EventRecord, NewEvent};
use annals_core::memory::InMemoryStorageAdapter;
use annals_core::schema::SchemaEventType;
use annals_core::storage::{Direction, EventsQueryOptions, StorageAdapter};
use annals_core::store::{EventStore, SimulationOptions};
use annals_core::typed::TypedEventType;
use annals_test_support::{
    FailingStorageAdapter, FixedClock, MockEventGenerator, RecordingStorageAdapter,
    SteppingClock,
};
use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize)]
struct FundsDeposited {
    amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Account {
    owner: Option<String>,
    balance: f64,
}

fn account_reducer(mut state: Account, event: &EventRecord) -> Result<Account, String> {
    match event.event_type.as_str() {
        "AccountOpened" => {
            state.owner = event.payload["owner"].as_str().map(str::to_owned);
        }
        "FundsDeposited" => {
            state.balance += event.payload["amount"]
                .as_f64()
                .ok_or("deposit without amount")?;
        }
        other => return Err(format!("unexpected event type {other}")),
    }
    Ok(state)
}

fn register_account_types(store: &mut EventStore) {
    store
        .register_event_type(
            SchemaEventType::new(
                "AccountOpened",
                json!({
                    "type": "object",
                    "properties": {"owner": {"type": "string"}},
                    "required": ["owner"]
                }),
            )
            .unwrap(),
        )
        .unwrap();
    store
        .register_event_type(
            TypedEventType::<FundsDeposited>::new("FundsDeposited")
                .with_check(|p| {
                    if p.amount > 0.0 {
                        Ok(())
                    } else {
                        Err(ValidationIssue::new("/amount", "must be positive"))
                    }
                })
                .with_sampler(|rng| FundsDeposited {
                    amount: f64::from(rng.next_u32_range(1, 1_000)),
                }),
        )
        .unwrap();
}

fn account_store(adapter: Arc<dyn StorageAdapter>) -> EventStore {
    let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    let mut store = EventStore::new(adapter).with_clock(Arc::new(FixedClock(fixed_now)));
    register_account_types(&mut store);
    store
}

#[tokio::test]
async fn test_account_scenario() {
    // Arrange
    let store = account_store(Arc::new(InMemoryStorageAdapter::new()));

    // Act
    let opened = store
        .append(
            "acc-1",
            "account",
            0,
            vec![NewEvent::new("AccountOpened", json!({"owner": "alice"}))],
        )
        .await
        .unwrap();
    let deposited = store
        .append(
            "acc-1",
            "account",
            1,
            vec![NewEvent::new("FundsDeposited", json!({"amount": 50}))],
        )
        .await
        .unwrap();
    let account = store
        .get_aggregate("acc-1", "account", account_reducer, Account::default())
        .await
        .unwrap();
    let stale = store
        .append(
            "acc-1",
            "account",
            1,
            vec![NewEvent::new("FundsDeposited", json!({"amount": 10}))],
        )
        .await;
    let after = store
        .get_aggregate("acc-1", "account", account_reducer, Account::default())
        .await
        .unwrap();

    // Assert
    assert_eq!(opened.new_version, 1);
    assert_eq!(deposited.new_version, 2);
    assert_eq!(account.version, 2);
    assert_eq!(
        account.state,
        Account {
            owner: Some("alice".to_owned()),
            balance: 50.0,
        }
    );
    match stale {
        Err(StoreError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, Some(2));
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
    assert_eq!(after.version, 2);
    assert_eq!(after.state, account.state);
}

#[tokio::test]
async fn test_concurrent_appends_at_same_version_have_one_winner() {
    let store = Arc::new(account_store(Arc::new(InMemoryStorageAdapter::new())));
    store
        .append(
            "acc-1",
            "account",
            0,
            vec![NewEvent::new("AccountOpened", json!({"owner": "alice"}))],
        )
        .await
        .unwrap();

    let handles: Vec<_> = (1..=2)
        .map(|amount| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .append(
                        "acc-1",
                        "account",
                        1,
                        vec![NewEvent::new("FundsDeposited", json!({"amount": amount}))],
                    )
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| r.as_ref().is_err_and(StoreError::is_conflict))
            .count(),
        1
    );
    let history = store
        .query_all("acc-1", "account", EventsQueryOptions::all())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_successive_appends_stay_gapless() {
    let store = account_store(Arc::new(InMemoryStorageAdapter::new()));
    store
        .append(
            "acc-1",
            "account",
            0,
            vec![NewEvent::new("AccountOpened", json!({"owner": "bob"}))],
        )
        .await
        .unwrap();

    let mut version = 1;
    for batch in 1..=4 {
        let events = (0..batch)
            .map(|_| NewEvent::new("FundsDeposited", json!({"amount": 1})))
            .collect();
        let outcome = store
            .append("acc-1", "account", version, events)
            .await
            .unwrap();
        let seqs: Vec<i64> = outcome.records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, (version + 1..=version + batch).collect::<Vec<_>>());
        version = outcome.new_version;
    }

    let history = store
        .query_all("acc-1", "account", EventsQueryOptions::all())
        .await
        .unwrap();
    let seqs: Vec<i64> = history.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, (1..=11).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_append_hands_stamped_events_to_adapter() {
    // Arrange
    let adapter = Arc::new(RecordingStorageAdapter::new(Vec::new()));
    let start = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    let mut store = EventStore::new(adapter.clone())
        .with_clock(Arc::new(SteppingClock::new(start, Duration::seconds(1))));
    register_account_types(&mut store);

    // Act
    store
        .append(
            "acc-9",
            "account",
            4,
            vec![
                NewEvent::new("FundsDeposited", json!({"amount": 5}))
                    .with_metadata(json!({"correlation_id": "c-1"})),
                NewEvent::new("FundsDeposited", json!({"amount": 6})),
            ],
        )
        .await
        .unwrap();

    // Assert
    let appended = adapter.appended();
    assert_eq!(appended.len(), 1);
    let call = &appended[0];
    assert_eq!(call.key.aggregate_id, "acc-9");
    assert_eq!(call.key.aggregate_type, "account");
    assert_eq!(call.expected_version, 4);
    assert_eq!(call.events.len(), 2);
    assert_eq!(call.events[0].created_at, start);
    assert_eq!(call.events[1].created_at, start);
    assert_eq!(call.events[0].metadata, json!({"correlation_id": "c-1"}));
    assert_ne!(call.events[0].event_id, call.events[1].event_id);
}

#[tokio::test]
async fn test_invalid_candidate_never_reaches_adapter() {
    let adapter = Arc::new(RecordingStorageAdapter::new(Vec::new()));
    let store = account_store(adapter.clone());

    let result = store
        .append(
            "acc-1",
            "account",
            0,
            vec![
                NewEvent::new("AccountOpened", json!({"owner": "alice"})),
                NewEvent::new("FundsDeposited", json!({"amount": -5})),
            ],
        )
        .await;

    match result {
        Err(StoreError::Validation(err)) => {
            assert_eq!(err.event_type, "FundsDeposited");
            assert_eq!(err.issues[0].path, "/amount");
        }
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(adapter.appended().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_surfaced_unchanged() {
    let store = account_store(Arc::new(FailingStorageAdapter));

    let append = store
        .append(
            "acc-1",
            "account",
            0,
            vec![NewEvent::new("AccountOpened", json!({"owner": "alice"}))],
        )
        .await;
    let query = store
        .query_all("acc-1", "account", EventsQueryOptions::all())
        .await;
    let reconstruct = store
        .reconstruct(
            "acc-1",
            "account",
            account_reducer,
            Account::default(),
            ReconstructOptions::default(),
        )
        .await;

    for result in [append.map(|_| ()), query.map(|_| ()), reconstruct.map(|_| ())] {
        match result {
            Err(StoreError::Storage(StorageError::Backend { message, .. })) => {
                assert_eq!(message, "connection refused");
            }
            other => panic!("expected Storage, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_query_fetches_lazily_in_pages() {
    // Arrange: a generated history of 7 records served 3 at a time.
    let registry_store = account_store(Arc::new(InMemoryStorageAdapter::new()));
    let key = AggregateKey::new("acc-1", "account");
    let mut types = vec!["AccountOpened"];
    types.extend(["FundsDeposited"; 6]);
    let history = MockEventGenerator::new(registry_store.registry(), 5)
        .history(&key, &types)
        .unwrap();
    let adapter = Arc::new(RecordingStorageAdapter::new(history));
    let store = account_store(adapter.clone())
        .with_config(EventStoreConfig { query_page_size: 3 });

    // Act
    let records = store
        .query_all("acc-1", "account", EventsQueryOptions::all().limit(5))
        .await
        .unwrap();

    // Assert
    let seqs: Vec<i64> = records.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    let pages: Vec<(Option<i64>, Option<usize>, Direction)> = adapter
        .queries()
        .iter()
        .map(|q| (q.from_sequence, q.limit, q.direction))
        .collect();
    assert_eq!(
        pages,
        vec![
            (Some(1), Some(3), Direction::Forward),
            (Some(4), Some(2), Direction::Forward),
        ]
    );
}

#[tokio::test]
async fn test_generated_fixtures_replay_through_store() {
    let store = account_store(Arc::new(InMemoryStorageAdapter::new()));
    let candidates = MockEventGenerator::new(store.registry(), 42)
        .candidates(&["AccountOpened", "FundsDeposited", "FundsDeposited"])
        .unwrap();

    let simulated = store
        .simulate_aggregate(
            "acc-1",
            "account",
            &candidates,
            account_reducer,
            Account::default(),
            SimulationOptions::default(),
        )
        .unwrap();
    store
        .append("acc-1", "account", 0, candidates)
        .await
        .unwrap();
    let persisted = store
        .get_aggregate("acc-1", "account", account_reducer, Account::default())
        .await
        .unwrap();

    assert_eq!(simulated.version, 3);
    assert_eq!(persisted.version, 3);
    assert_eq!(simulated.state, persisted.state);
    assert!(persisted.state.balance > 0.0);
}

#[tokio::test]
async fn test_reducer_failure_identifies_offending_record() {
    let store = account_store(Arc::new(InMemoryStorageAdapter::new()));
    store
        .append(
            "acc-1",
            "account",
            0,
            vec![
                NewEvent::new("AccountOpened", json!({"owner": "alice"})),
                NewEvent::new("FundsDeposited", json!({"amount": 3})),
            ],
        )
        .await
        .unwrap();
    let strict = |state: Account, event: &EventRecord| -> Result<Account, String> {
        if event.event_type == "FundsDeposited" {
            return Err("deposits are frozen".to_owned());
        }
        account_reducer(state, event)
    };

    let err = store
        .get_aggregate("acc-1", "account", strict, Account::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Reconstruction { sequence_number: 2, .. }
    ));
    assert_eq!(
        err.to_string(),
        "reconstruction of account/acc-1 failed at sequence number 2: deposits are frozen"
    );
}
