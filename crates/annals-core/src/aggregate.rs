//! Aggregate reconstruction.
//!
//! An aggregate is never stored. It is recomputed on demand by folding the
//! aggregate's ordered history through a caller-supplied reducer
//! `(state, &EventRecord) -> Result<state, E>`.

use serde::Serialize;

use crate::error::{BoxError, StoreError};
use crate::event::{AggregateKey, EventRecord};

/// A reconstructed projection of an aggregate's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate<S> {
    /// The aggregate identifier.
    pub aggregate_id: String,
    /// The aggregate's domain kind.
    pub aggregate_type: String,
    /// Sequence number of the last folded event (0 if none).
    pub version: i64,
    /// State produced by the reducer.
    pub state: S,
}

impl<S> Aggregate<S> {
    /// An aggregate at `version` holding `state`, before any further folding.
    #[must_use]
    pub fn at(key: &AggregateKey, version: i64, state: S) -> Self {
        Self {
            aggregate_id: key.aggregate_id.clone(),
            aggregate_type: key.aggregate_type.clone(),
            version,
            state,
        }
    }

    /// Returns the aggregate's key.
    #[must_use]
    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.aggregate_id.clone(), self.aggregate_type.clone())
    }

    /// Returns `true` once at least one event has been folded.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// Folds one more record into the aggregate.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Reconstruction` wrapping the reducer's error and
    /// naming the record's sequence number. The aggregate is consumed.
    pub fn apply<F, E>(self, reducer: &F, record: &EventRecord) -> Result<Self, StoreError>
    where
        F: Fn(S, &EventRecord) -> Result<S, E>,
        E: Into<BoxError>,
    {
        let state = reducer(self.state, record).map_err(|e| StoreError::Reconstruction {
            aggregate_id: record.aggregate_id.clone(),
            aggregate_type: record.aggregate_type.clone(),
            sequence_number: record.sequence_number,
            source: e.into(),
        })?;
        Ok(Self {
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            version: record.sequence_number,
            state,
        })
    }
}

/// Bounds for [`EventStore::reconstruct`](crate::store::EventStore::reconstruct).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Version of a snapshot the initial state was taken at. Folding starts
    /// at the following sequence number.
    pub resume_from: Option<i64>,
    /// Inclusive upper bound, for reconstructing past states.
    pub to_sequence: Option<i64>,
}

impl ReconstructOptions {
    /// Resumes from a snapshot taken at `version`.
    #[must_use]
    pub fn resume_from(mut self, version: i64) -> Self {
        self.resume_from = Some(version);
        self
    }

    /// Stops after sequence number `sequence`.
    #[must_use]
    pub fn up_to(mut self, sequence: i64) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    /// Version reported when no further events are folded.
    #[must_use]
    pub fn start_version(&self) -> i64 {
        self.resume_from.unwrap_or(0).max(0)
    }
}

/// Folds `records` left to right, starting from `initial` at `start_version`.
///
/// # Errors
///
/// Returns `StoreError::Reconstruction` for the first record the reducer
/// rejects.
pub fn fold_events<'a, S, F, E>(
    key: &AggregateKey,
    records: impl IntoIterator<Item = &'a EventRecord>,
    reducer: &F,
    initial: S,
    start_version: i64,
) -> Result<Aggregate<S>, StoreError>
where
    F: Fn(S, &EventRecord) -> Result<S, E>,
    E: Into<BoxError>,
{
    records
        .into_iter()
        .try_fold(Aggregate::at(key, start_version, initial), |aggregate, record| {
            aggregate.apply(reducer, record)
        })
}
