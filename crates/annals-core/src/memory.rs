//! In-memory implementation of the `StorageAdapter` trait.
//!
//! Used for local development and tests. The write lock makes the version
//! check and the insert a single atomic step, so concurrent appends at the
//! same expected version produce exactly one winner.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::event::{AggregateKey, EventRecord, PendingEvent};
use crate::storage::{
    AggregateIdsPage, AppendOutcome, Direction, EventsQueryOptions, ListAggregateIdsOptions,
    StorageAdapter,
};

/// Stores every aggregate's history in a map guarded by a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStorageAdapter {
    streams: RwLock<BTreeMap<AggregateKey, Vec<EventRecord>>>,
}

impl InMemoryStorageAdapter {
    /// Creates an empty adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of `key` (0 when it has no events).
    pub async fn version(&self, key: &AggregateKey) -> i64 {
        let streams = self.streams.read().await;
        streams.get(key).map_or(0, |events| stream_version(events))
    }

    /// Total number of stored records across all aggregates.
    pub async fn len(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn stream_version(events: &[EventRecord]) -> i64 {
    events.last().map_or(0, |e| e.sequence_number)
}

#[async_trait]
impl StorageAdapter for InMemoryStorageAdapter {
    async fn append(
        &self,
        key: &AggregateKey,
        expected_version: i64,
        events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        let mut streams = self.streams.write().await;

        let actual = streams.get(key).map_or(0, |events| stream_version(events));
        if actual != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                aggregate_id: key.aggregate_id.clone(),
                aggregate_type: key.aggregate_type.clone(),
                expected: expected_version,
                actual: Some(actual),
            });
        }

        let records: Vec<EventRecord> = (expected_version + 1..)
            .zip(events)
            .map(|(sequence_number, pending)| pending.into_record(key, sequence_number))
            .collect();
        let stream = streams.entry(key.clone()).or_default();
        stream.extend(records.iter().cloned());

        Ok(AppendOutcome {
            new_version: stream_version(stream),
            records,
        })
    }

    async fn query(
        &self,
        key: &AggregateKey,
        options: &EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError> {
        if options.is_empty_range() {
            return Ok(Vec::new());
        }
        let streams = self.streams.read().await;
        let Some(stream) = streams.get(key) else {
            return Ok(Vec::new());
        };

        let matching = stream.iter().filter(|e| options.contains(e.sequence_number));
        let limit = options.limit.unwrap_or(usize::MAX);
        let records = match options.direction {
            Direction::Forward => matching.take(limit).cloned().collect(),
            Direction::Backward => matching.rev().take(limit).cloned().collect(),
        };
        Ok(records)
    }

    async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError> {
        let streams = self.streams.read().await;
        let mut ids = streams
            .iter()
            .filter(|(key, events)| key.aggregate_type == aggregate_type && !events.is_empty())
            .map(|(key, _)| key.aggregate_id.as_str())
            .filter(|id| options.page_token.as_deref().is_none_or(|token| *id > token));

        let limit = options.limit.unwrap_or(usize::MAX);
        let aggregate_ids: Vec<String> = ids.by_ref().take(limit).map(str::to_owned).collect();
        let next_page_token = if ids.next().is_some() {
            aggregate_ids.last().cloned()
        } else {
            None
        };

        Ok(AggregateIdsPage {
            aggregate_ids,
            next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn pending(n: usize) -> Vec<PendingEvent> {
        (0..n)
            .map(|i| PendingEvent {
                event_id: Uuid::new_v4(),
                event_type: "TestEvent".to_owned(),
                payload: json!({"i": i}),
                metadata: serde_json::Value::Null,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_append_assigns_contiguous_sequence_numbers() {
        // Arrange
        let adapter = InMemoryStorageAdapter::new();
        let key = AggregateKey::new("acc-1", "account");

        // Act
        let first = adapter.append(&key, 0, pending(2)).await.unwrap();
        let second = adapter.append(&key, 2, pending(3)).await.unwrap();

        // Assert
        assert_eq!(first.new_version, 2);
        assert_eq!(second.new_version, 5);
        let seqs: Vec<i64> = second.records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
        assert_eq!(adapter.version(&key).await, 5);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected_without_writing() {
        let adapter = InMemoryStorageAdapter::new();
        let key = AggregateKey::new("acc-1", "account");
        adapter.append(&key, 0, pending(2)).await.unwrap();

        let result = adapter.append(&key, 0, pending(2)).await;

        match result {
            Err(StoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, Some(2));
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(adapter.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_have_one_winner() {
        let adapter = Arc::new(InMemoryStorageAdapter::new());
        let key = AggregateKey::new("acc-1", "account");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let adapter = Arc::clone(&adapter);
                let key = key.clone();
                tokio::spawn(async move { adapter.append(&key, 0, pending(1)).await })
            })
            .collect();

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) if err.is_conflict() => conflicts += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(adapter.version(&key).await, 1);
    }

    #[tokio::test]
    async fn test_query_bounds_direction_and_limit() {
        let adapter = InMemoryStorageAdapter::new();
        let key = AggregateKey::new("acc-1", "account");
        adapter.append(&key, 0, pending(6)).await.unwrap();

        let forward = adapter
            .query(&key, &EventsQueryOptions::all().from_sequence(2).to_sequence(5).limit(3))
            .await
            .unwrap();
        let backward = adapter
            .query(&key, &EventsQueryOptions::all().to_sequence(5).limit(2).backward())
            .await
            .unwrap();

        let seqs = |records: &[EventRecord]| {
            records
                .iter()
                .map(|r| r.sequence_number)
                .collect::<Vec<_>>()
        };
        assert_eq!(seqs(&forward), vec![2, 3, 4]);
        assert_eq!(seqs(&backward), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_query_unknown_aggregate_is_empty() {
        let adapter = InMemoryStorageAdapter::new();

        let records = adapter
            .query(&AggregateKey::new("missing", "account"), &EventsQueryOptions::all())
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_aggregates_are_isolated_by_type() {
        let adapter = InMemoryStorageAdapter::new();
        adapter
            .append(&AggregateKey::new("x", "account"), 0, pending(1))
            .await
            .unwrap();
        adapter
            .append(&AggregateKey::new("x", "customer"), 0, pending(2))
            .await
            .unwrap();

        assert_eq!(adapter.version(&AggregateKey::new("x", "account")).await, 1);
        assert_eq!(adapter.version(&AggregateKey::new("x", "customer")).await, 2);
    }

    #[tokio::test]
    async fn test_list_aggregate_ids_pages_in_order() {
        let adapter = InMemoryStorageAdapter::new();
        for id in ["c", "a", "d", "b"] {
            adapter
                .append(&AggregateKey::new(id, "account"), 0, pending(1))
                .await
                .unwrap();
        }
        adapter
            .append(&AggregateKey::new("z", "customer"), 0, pending(1))
            .await
            .unwrap();

        let first = adapter
            .list_aggregate_ids(
                "account",
                &ListAggregateIdsOptions {
                    limit: Some(3),
                    page_token: None,
                },
            )
            .await
            .unwrap();
        let second = adapter
            .list_aggregate_ids(
                "account",
                &ListAggregateIdsOptions {
                    limit: Some(3),
                    page_token: first.next_page_token.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(first.aggregate_ids, vec!["a", "b", "c"]);
        assert_eq!(first.next_page_token.as_deref(), Some("c"));
        assert_eq!(second.aggregate_ids, vec!["d"]);
        assert_eq!(second.next_page_token, None);
    }
}
