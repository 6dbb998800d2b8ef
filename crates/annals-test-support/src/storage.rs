//! Mock `StorageAdapter` implementations for tests.

use std::sync::Mutex;

use annals_core::error::{StorageError, StoreError};
use annals_core::event::{AggregateKey, EventRecord, PendingEvent};
use annals_core::storage::{
    AggregateIdsPage, AppendOutcome, Direction, EventsQueryOptions, ListAggregateIdsOptions,
    StorageAdapter,
};
use async_trait::async_trait;

/// One recorded `append` call.
#[derive(Debug, Clone)]
pub struct RecordedAppend {
    /// Target aggregate.
    pub key: AggregateKey,
    /// Version the store passed as expected.
    pub expected_version: i64,
    /// The stamped events the store handed over.
    pub events: Vec<PendingEvent>,
}

/// A storage adapter that records every call. Appends always succeed and are
/// numbered from `expected_version + 1` without any conflict check; queries
/// answer from the configured history, honoring bounds, direction and limit.
#[derive(Debug)]
pub struct RecordingStorageAdapter {
    history: Mutex<Vec<EventRecord>>,
    appended: Mutex<Vec<RecordedAppend>>,
    queries: Mutex<Vec<EventsQueryOptions>>,
}

impl RecordingStorageAdapter {
    /// Create a new recording adapter that answers queries from `history`
    /// (records of a single aggregate, in sequence order).
    #[must_use]
    pub fn new(history: Vec<EventRecord>) -> Self {
        Self {
            history: Mutex::new(history),
            appended: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all recorded appends.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended(&self) -> Vec<RecordedAppend> {
        self.appended.lock().unwrap().clone()
    }

    /// Returns the options of every adapter query, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn queries(&self) -> Vec<EventsQueryOptions> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageAdapter for RecordingStorageAdapter {
    async fn append(
        &self,
        key: &AggregateKey,
        expected_version: i64,
        events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        self.appended.lock().unwrap().push(RecordedAppend {
            key: key.clone(),
            expected_version,
            events: events.clone(),
        });
        let records: Vec<EventRecord> = (expected_version + 1..)
            .zip(events)
            .map(|(sequence_number, pending)| pending.into_record(key, sequence_number))
            .collect();
        let new_version = records
            .last()
            .map_or(expected_version, |r| r.sequence_number);
        Ok(AppendOutcome {
            new_version,
            records,
        })
    }

    async fn query(
        &self,
        _key: &AggregateKey,
        options: &EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError> {
        self.queries.lock().unwrap().push(*options);
        let history = self.history.lock().unwrap();
        let matching = history.iter().filter(|e| options.contains(e.sequence_number));
        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(match options.direction {
            Direction::Forward => matching.take(limit).cloned().collect(),
            Direction::Backward => matching.rev().take(limit).cloned().collect(),
        })
    }

    async fn list_aggregate_ids(
        &self,
        _aggregate_type: &str,
        _options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError> {
        let history = self.history.lock().unwrap();
        Ok(AggregateIdsPage {
            aggregate_ids: history
                .first()
                .map(|e| vec![e.aggregate_id.clone()])
                .unwrap_or_default(),
            next_page_token: None,
        })
    }
}

/// A storage adapter that always fails with a backend error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingStorageAdapter;

fn connection_refused() -> StoreError {
    StoreError::Storage(StorageError::message("connection refused"))
}

#[async_trait]
impl StorageAdapter for FailingStorageAdapter {
    async fn append(
        &self,
        _key: &AggregateKey,
        _expected_version: i64,
        _events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        Err(connection_refused())
    }

    async fn query(
        &self,
        _key: &AggregateKey,
        _options: &EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError> {
        Err(connection_refused())
    }

    async fn list_aggregate_ids(
        &self,
        _aggregate_type: &str,
        _options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError> {
        Err(connection_refused())
    }
}

/// A storage adapter whose appends always lose the race: every append fails
/// with a conflict reporting `actual` as the current version. Queries return
/// nothing.
#[derive(Debug)]
pub struct ConflictingStorageAdapter {
    /// Version reported in every conflict.
    pub actual: i64,
}

#[async_trait]
impl StorageAdapter for ConflictingStorageAdapter {
    async fn append(
        &self,
        key: &AggregateKey,
        expected_version: i64,
        _events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        Err(StoreError::ConcurrencyConflict {
            aggregate_id: key.aggregate_id.clone(),
            aggregate_type: key.aggregate_type.clone(),
            expected: expected_version,
            actual: Some(self.actual),
        })
    }

    async fn query(
        &self,
        _key: &AggregateKey,
        _options: &EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn list_aggregate_ids(
        &self,
        _aggregate_type: &str,
        _options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError> {
        Ok(AggregateIdsPage::default())
    }
}
