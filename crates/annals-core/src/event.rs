//! Event records and the candidates they are created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one aggregate instance: its id within its domain kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateKey {
    /// Opaque identifier of the aggregate instance.
    pub aggregate_id: String,
    /// Discriminator naming the aggregate's domain kind.
    pub aggregate_type: String,
}

impl AggregateKey {
    /// Creates a key from an id and a type.
    #[must_use]
    pub fn new(aggregate_id: impl Into<String>, aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
        }
    }
}

impl std::fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// An immutable, persisted fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: String,
    /// Domain kind of the aggregate.
    pub aggregate_type: String,
    /// Position in the aggregate's history, 1-based and gapless.
    pub sequence_number: i64,
    /// Name of the registered event type that validated the payload.
    pub event_type: String,
    /// Event payload.
    pub payload: serde_json::Value,
    /// Side-channel data (correlation ids, actors). Never validated.
    pub metadata: serde_json::Value,
    /// Timestamp assigned at append time.
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Returns the key of the aggregate this record belongs to.
    #[must_use]
    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.aggregate_id.clone(), self.aggregate_type.clone())
    }
}

/// A candidate event submitted for append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Registered event type name.
    pub event_type: String,
    /// Payload to validate and persist.
    pub payload: serde_json::Value,
    /// Opaque metadata, `null` unless set.
    pub metadata: serde_json::Value,
}

impl NewEvent {
    /// Creates a candidate with no metadata.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attaches metadata to the candidate.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A validated candidate, stamped by the store and handed to the adapter.
/// The adapter assigns the sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    /// Identifier assigned by the store.
    pub event_id: Uuid,
    /// Registered event type name.
    pub event_type: String,
    /// Validated payload.
    pub payload: serde_json::Value,
    /// Opaque metadata.
    pub metadata: serde_json::Value,
    /// Append timestamp.
    pub created_at: DateTime<Utc>,
}

impl PendingEvent {
    /// Turns the pending event into a record at `sequence_number`.
    #[must_use]
    pub fn into_record(self, key: &AggregateKey, sequence_number: i64) -> EventRecord {
        EventRecord {
            event_id: self.event_id,
            aggregate_id: key.aggregate_id.clone(),
            aggregate_type: key.aggregate_type.clone(),
            sequence_number,
            event_type: self.event_type,
            payload: self.payload,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}
