//! Storage adapter abstraction.
//!
//! The adapter is the physical ledger and the only ordering authority for an
//! aggregate: its conditional append must be atomic with respect to every
//! other conditional append on the same key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::event::{AggregateKey, EventRecord, PendingEvent};

/// Order in which a query yields records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending sequence numbers.
    #[default]
    Forward,
    /// Descending sequence numbers.
    Backward,
}

/// Bounds for reading an aggregate's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsQueryOptions {
    /// Inclusive lower bound; values below 1 read from the start.
    pub from_sequence: Option<i64>,
    /// Inclusive upper bound; `None` reads to the end.
    pub to_sequence: Option<i64>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
    /// Order of the returned records.
    pub direction: Direction,
}

impl EventsQueryOptions {
    /// Reads the whole history forward.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn from_sequence(mut self, from: i64) -> Self {
        self.from_sequence = Some(from);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn to_sequence(mut self, to: i64) -> Self {
        self.to_sequence = Some(to);
        self
    }

    /// Caps the number of records.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reads newest first.
    #[must_use]
    pub fn backward(mut self) -> Self {
        self.direction = Direction::Backward;
        self
    }

    /// The effective inclusive lower bound (at least 1).
    #[must_use]
    pub fn lower_bound(&self) -> i64 {
        self.from_sequence.unwrap_or(1).max(1)
    }

    /// Returns `true` when no record can match.
    #[must_use]
    pub fn is_empty_range(&self) -> bool {
        self.limit == Some(0) || self.to_sequence.is_some_and(|to| to < self.lower_bound())
    }

    /// Returns `true` if `sequence_number` lies inside the bounds.
    #[must_use]
    pub fn contains(&self, sequence_number: i64) -> bool {
        sequence_number >= self.lower_bound()
            && self.to_sequence.is_none_or(|to| sequence_number <= to)
    }
}

/// Result of a successful conditional append.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    /// Version of the aggregate after the append.
    pub new_version: i64,
    /// The persisted records, in assigned order.
    pub records: Vec<EventRecord>,
}

/// Paging for [`StorageAdapter::list_aggregate_ids`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListAggregateIdsOptions {
    /// Maximum ids per page; `None` returns every remaining id.
    pub limit: Option<usize>,
    /// Continuation token from a previous page.
    pub page_token: Option<String>,
}

/// One page of aggregate ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateIdsPage {
    /// Ids in ascending order.
    pub aggregate_ids: Vec<String>,
    /// Token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Durable, append-only storage of event records keyed by aggregate.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Appends `events` to the aggregate if and only if its current version
    /// equals `expected_version`, assigning sequence numbers
    /// `expected_version + 1 ..= expected_version + events.len()`.
    ///
    /// All events are persisted or none are.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConcurrencyConflict` when the version differs and
    /// `StoreError::Storage` for backend failures.
    async fn append(
        &self,
        key: &AggregateKey,
        expected_version: i64,
        events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError>;

    /// Returns the records of one aggregate inside `options`' bounds, ordered
    /// by `options.direction` and truncated to `options.limit`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` for backend failures.
    async fn query(
        &self,
        key: &AggregateKey,
        options: &EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Lists ids of aggregates of `aggregate_type` that have at least one event.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` for backend failures, or
    /// `StoreError::InvalidArgument` for a token this adapter did not issue.
    async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError>;
}
