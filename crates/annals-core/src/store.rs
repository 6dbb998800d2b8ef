//! The event store: validated append, paged replay and reconstruction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::aggregate::{Aggregate, ReconstructOptions, fold_events};
use crate::clock::{Clock, SystemClock};
use crate::config::EventStoreConfig;
use crate::error::{BoxError, StoreError};
use crate::event::{AggregateKey, EventRecord, NewEvent, PendingEvent};
use crate::event_type::EventType;
use crate::registry::EventTypeRegistry;
use crate::storage::{
    AggregateIdsPage, AppendOutcome, Direction, EventsQueryOptions, ListAggregateIdsOptions,
    StorageAdapter,
};

/// Lazy, ordered sequence of records returned by [`EventStore::query`].
pub type EventStream = BoxStream<'static, Result<EventRecord, StoreError>>;

/// Options for [`EventStore::simulate_aggregate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Timestamp stamped on simulated records; the store clock when `None`.
    pub simulation_date: Option<DateTime<Utc>>,
}

/// The single authority for validated, ordered, conflict-checked event
/// persistence and retrieval.
///
/// The store does not serialize writes itself. Ordering and conflict
/// detection are delegated to the adapter's conditional append, and failed
/// appends are never retried here.
pub struct EventStore {
    registry: EventTypeRegistry,
    adapter: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    config: EventStoreConfig,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("event_types", &self.registry.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventStore {
    /// Creates a store over `adapter` with an empty registry and the system
    /// clock.
    #[must_use]
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            registry: EventTypeRegistry::new(),
            adapter,
            clock: Arc::new(SystemClock),
            config: EventStoreConfig::default(),
        }
    }

    /// Replaces the clock used to stamp `created_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the tuning configuration.
    #[must_use]
    pub fn with_config(mut self, config: EventStoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an event type.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateEventType` if the name is taken.
    pub fn register_event_type<T>(&mut self, event_type: T) -> Result<(), StoreError>
    where
        T: EventType + 'static,
    {
        self.registry.register(Arc::new(event_type))
    }

    /// Registers an event type shared with other stores.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateEventType` if the name is taken.
    pub fn register_shared_event_type(
        &mut self,
        event_type: Arc<dyn EventType>,
    ) -> Result<(), StoreError> {
        self.registry.register(event_type)
    }

    /// The store's event type registry.
    #[must_use]
    pub fn registry(&self) -> &EventTypeRegistry {
        &self.registry
    }

    /// Registered event type names, sorted.
    #[must_use]
    pub fn event_type_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Appends `events` to an aggregate whose current version the caller
    /// believes to be `expected_version`.
    ///
    /// Every payload is validated before anything is written. The batch is
    /// then handed to the adapter as one conditional append, which assigns
    /// sequence numbers `expected_version + 1 ..`.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidArgument` for an empty batch or negative version.
    /// - `StoreError::UnknownEventType` / `StoreError::Validation` if any
    ///   candidate is rejected; nothing is written.
    /// - `StoreError::ConcurrencyConflict` if the aggregate moved on.
    /// - `StoreError::Storage` if the adapter fails.
    #[tracing::instrument(
        skip(self, events),
        fields(event_count = events.len())
    )]
    pub async fn append(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        expected_version: i64,
        events: Vec<NewEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        if events.is_empty() {
            return Err(StoreError::InvalidArgument(
                "cannot append an empty batch of events".to_owned(),
            ));
        }
        if expected_version < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "expected version must not be negative, got {expected_version}"
            )));
        }

        for event in &events {
            self.registry.validate(&event.event_type, &event.payload)?;
        }

        let created_at = self.clock.now();
        let pending: Vec<PendingEvent> = events
            .into_iter()
            .map(|event| PendingEvent {
                event_id: Uuid::new_v4(),
                event_type: event.event_type,
                payload: event.payload,
                metadata: event.metadata,
                created_at,
            })
            .collect();

        let key = AggregateKey::new(aggregate_id, aggregate_type);
        match self.adapter.append(&key, expected_version, pending).await {
            Ok(outcome) => {
                tracing::debug!(new_version = outcome.new_version, "appended events");
                Ok(outcome)
            }
            Err(err) if err.is_conflict() => {
                tracing::warn!(error = %err, "append rejected by concurrency check");
                Err(err)
            }
            Err(err) => {
                tracing::error!(error = %err, "append failed");
                Err(err)
            }
        }
    }

    /// Streams an aggregate's records within `options`.
    ///
    /// Records are fetched lazily from the adapter one page at a time. An
    /// aggregate without matching events yields an empty stream.
    #[must_use]
    pub fn query(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        options: EventsQueryOptions,
    ) -> EventStream {
        let adapter = Arc::clone(&self.adapter);
        let key = AggregateKey::new(aggregate_id, aggregate_type);
        let page_size = self.config.query_page_size.max(1);
        let cursor = PageCursor::new(&options);

        tracing::debug!(aggregate = %key, ?options, "querying events");

        stream::try_unfold(cursor, move |cursor| {
            next_page(Arc::clone(&adapter), key.clone(), cursor, page_size)
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, StoreError>)))
        .try_flatten()
        .boxed()
    }

    /// Collects [`query`](Self::query) into a vector.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` if the adapter fails.
    pub async fn query_all(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        options: EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError> {
        self.query(aggregate_id, aggregate_type, options)
            .try_collect()
            .await
    }

    /// Rebuilds an aggregate by folding its history through `reducer`.
    ///
    /// With default options the whole history is folded from `initial` and
    /// the result has version 0 when there are no events. With
    /// `resume_from(v)`, `initial` is taken to be the state at version `v`
    /// and only later events are folded.
    ///
    /// # Errors
    ///
    /// - `StoreError::Reconstruction` if the reducer rejects an event.
    /// - `StoreError::Storage` if the adapter fails.
    #[tracing::instrument(skip(self, reducer, initial))]
    pub async fn reconstruct<S, F, E>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        reducer: F,
        initial: S,
        options: ReconstructOptions,
    ) -> Result<Aggregate<S>, StoreError>
    where
        F: Fn(S, &EventRecord) -> Result<S, E>,
        E: Into<BoxError>,
    {
        let key = AggregateKey::new(aggregate_id, aggregate_type);
        let start_version = options.start_version();
        let query = EventsQueryOptions {
            from_sequence: Some(start_version + 1),
            to_sequence: options.to_sequence,
            limit: None,
            direction: Direction::Forward,
        };

        let mut events = self.query(aggregate_id, aggregate_type, query);
        let mut aggregate = Aggregate::at(&key, start_version, initial);
        while let Some(record) = events.try_next().await? {
            aggregate = aggregate.apply(&reducer, &record)?;
        }

        tracing::debug!(version = aggregate.version, "reconstructed aggregate");
        Ok(aggregate)
    }

    /// Rebuilds an aggregate from its full history.
    ///
    /// # Errors
    ///
    /// See [`reconstruct`](Self::reconstruct).
    pub async fn get_aggregate<S, F, E>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        reducer: F,
        initial: S,
    ) -> Result<Aggregate<S>, StoreError>
    where
        F: Fn(S, &EventRecord) -> Result<S, E>,
        E: Into<BoxError>,
    {
        self.reconstruct(
            aggregate_id,
            aggregate_type,
            reducer,
            initial,
            ReconstructOptions::default(),
        )
        .await
    }

    /// Like [`get_aggregate`](Self::get_aggregate), but an aggregate without
    /// events is an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AggregateNotFound` when the history is empty, and
    /// otherwise the errors of [`reconstruct`](Self::reconstruct).
    pub async fn get_existing_aggregate<S, F, E>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        reducer: F,
        initial: S,
    ) -> Result<Aggregate<S>, StoreError>
    where
        F: Fn(S, &EventRecord) -> Result<S, E>,
        E: Into<BoxError>,
    {
        let aggregate = self
            .get_aggregate(aggregate_id, aggregate_type, reducer, initial)
            .await?;
        if aggregate.exists() {
            Ok(aggregate)
        } else {
            Err(StoreError::AggregateNotFound {
                aggregate_id: aggregate_id.to_owned(),
                aggregate_type: aggregate_type.to_owned(),
            })
        }
    }

    /// Lists ids of aggregates of `aggregate_type`, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` if the adapter fails.
    #[tracing::instrument(skip(self))]
    pub async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError> {
        if options.limit == Some(0) {
            return Err(StoreError::InvalidArgument(
                "page limit must be positive".to_owned(),
            ));
        }
        self.adapter.list_aggregate_ids(aggregate_type, options).await
    }

    /// Folds candidate events without persisting them.
    ///
    /// Candidates are validated exactly as [`append`](Self::append) would and
    /// numbered from 1, which makes this a dry run of a brand-new aggregate.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownEventType` / `StoreError::Validation` for
    /// rejected candidates and `StoreError::Reconstruction` for reducer
    /// failures.
    pub fn simulate_aggregate<S, F, E>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: &[NewEvent],
        reducer: F,
        initial: S,
        options: SimulationOptions,
    ) -> Result<Aggregate<S>, StoreError>
    where
        F: Fn(S, &EventRecord) -> Result<S, E>,
        E: Into<BoxError>,
    {
        for event in events {
            self.registry.validate(&event.event_type, &event.payload)?;
        }

        let key = AggregateKey::new(aggregate_id, aggregate_type);
        let created_at = options.simulation_date.unwrap_or_else(|| self.clock.now());
        let records: Vec<EventRecord> = (1..)
            .zip(events)
            .map(|(sequence_number, event)| {
                PendingEvent {
                    event_id: Uuid::new_v4(),
                    event_type: event.event_type.clone(),
                    payload: event.payload.clone(),
                    metadata: event.metadata.clone(),
                    created_at,
                }
                .into_record(&key, sequence_number)
            })
            .collect();

        fold_events(&key, &records, &reducer, initial, 0)
    }
}

#[derive(Debug, Clone, Copy)]
struct PageCursor {
    lower: i64,
    upper: Option<i64>,
    remaining: Option<usize>,
    direction: Direction,
    exhausted: bool,
}

impl PageCursor {
    fn new(options: &EventsQueryOptions) -> Self {
        Self {
            lower: options.lower_bound(),
            upper: options.to_sequence,
            remaining: options.limit,
            direction: options.direction,
            exhausted: options.is_empty_range(),
        }
    }

    fn page_options(&self, page_size: usize) -> EventsQueryOptions {
        EventsQueryOptions {
            from_sequence: Some(self.lower),
            to_sequence: self.upper,
            limit: Some(self.remaining.map_or(page_size, |r| r.min(page_size))),
            direction: self.direction,
        }
    }

    fn advance(self, page: &[EventRecord], requested: usize) -> Self {
        let remaining = self.remaining.map(|r| r.saturating_sub(page.len()));
        let Some(last) = page.last().map(|r| r.sequence_number) else {
            return Self {
                exhausted: true,
                ..self
            };
        };
        let (lower, upper) = match self.direction {
            Direction::Forward => (last + 1, self.upper),
            Direction::Backward => (self.lower, Some(last - 1)),
        };
        let exhausted = page.len() < requested
            || remaining == Some(0)
            || upper.is_some_and(|upper| upper < lower);
        Self {
            lower,
            upper,
            remaining,
            direction: self.direction,
            exhausted,
        }
    }
}

async fn next_page(
    adapter: Arc<dyn StorageAdapter>,
    key: AggregateKey,
    cursor: PageCursor,
    page_size: usize,
) -> Result<Option<(Vec<EventRecord>, PageCursor)>, StoreError> {
    if cursor.exhausted {
        return Ok(None);
    }
    let options = cursor.page_options(page_size);
    let requested = options.limit.unwrap_or(page_size);
    let page = adapter.query(&key, &options).await?;
    tracing::trace!(aggregate = %key, records = page.len(), "fetched page");
    if page.is_empty() {
        return Ok(None);
    }
    let next = cursor.advance(&page, requested);
    Ok(Some((page, next)))
}
