//! Error types for the event store.

use std::time::Duration;

use thiserror::Error;

/// Boxed error used for causes that originate outside this crate
/// (reducers, storage drivers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single validation failure inside an event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer to the offending value (`""` for the payload root).
    pub path: String,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A payload rejected by its event type's validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid payload for event type {event_type}: {}", join_issues(.issues))]
pub struct ValidationError {
    /// The event type whose validator rejected the payload.
    pub event_type: String,
    /// Every violation found, in document order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Creates a validation error with a single issue.
    #[must_use]
    pub fn single(
        event_type: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            issues: vec![ValidationIssue::new(path, message)],
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure reported by a storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed (connection, I/O, driver error).
    #[error("storage backend error: {message}")]
    Backend {
        /// Description of the failed operation.
        message: String,
        /// The driver-level cause, when there is one.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend did not answer within the configured deadline.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// A persisted row could not be decoded into an event record.
    #[error("corrupt event record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Wraps a driver error.
    pub fn backend(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// A backend failure without an underlying cause.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

/// Top-level error type returned by every event store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An event type name was used that was never registered.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// An event type with this name is already registered.
    #[error("duplicate event type: {0}")]
    DuplicateEventType(String),

    /// A payload failed validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on aggregate {aggregate_type}/{aggregate_id}: expected version {expected}, found {}",
        .actual.map_or_else(|| "unknown".to_owned(), |v| v.to_string())
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The aggregate's type.
        aggregate_type: String,
        /// The version the caller expected.
        expected: i64,
        /// The version found in storage, when the adapter knows it.
        actual: Option<i64>,
    },

    /// The storage adapter failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A reducer failed while folding an event.
    #[error(
        "reconstruction of {aggregate_type}/{aggregate_id} failed at sequence number {sequence_number}: {source}"
    )]
    Reconstruction {
        /// The aggregate being reconstructed.
        aggregate_id: String,
        /// The aggregate's type.
        aggregate_type: String,
        /// Sequence number of the event the reducer rejected.
        sequence_number: i64,
        /// The reducer's error.
        #[source]
        source: BoxError,
    },

    /// An aggregate with no events was requested as existing.
    #[error("aggregate not found: {aggregate_type}/{aggregate_id}")]
    AggregateNotFound {
        /// The requested aggregate.
        aggregate_id: String,
        /// The aggregate's type.
        aggregate_type: String,
    },

    /// A caller-supplied argument was rejected before touching storage.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Returns `true` for optimistic concurrency conflicts, the only failure
    /// a caller can resolve by reloading and retrying.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
