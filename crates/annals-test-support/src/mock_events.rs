//! Seeded generation of event fixtures.
//!
//! Payloads come from each event type's own sampler and are run back through
//! the registry before they are handed out, so every generated record would
//! be accepted by an `EventStore` using the same registry.

use annals_core::error::StoreError;
use annals_core::event::{AggregateKey, EventRecord, NewEvent, PendingEvent};
use annals_core::registry::EventTypeRegistry;
use annals_core::rng::{DeterministicRng, SeededRng};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::{Builder, Uuid};

/// Generates candidate events and full histories for a registry.
///
/// The same registry, seed and calls always produce the same output,
/// including event ids and timestamps.
#[derive(Debug)]
pub struct MockEventGenerator<'a> {
    registry: &'a EventTypeRegistry,
    rng: SeededRng,
    start: DateTime<Utc>,
    step: Duration,
}

impl<'a> MockEventGenerator<'a> {
    /// Creates a generator over `registry` seeded with `seed`. Timestamps
    /// start at 2026-01-01T00:00:00Z and advance one minute per record.
    #[must_use]
    pub fn new(registry: &'a EventTypeRegistry, seed: u64) -> Self {
        Self {
            registry,
            rng: SeededRng::new(seed),
            start: Utc
                .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            step: Duration::minutes(1),
        }
    }

    /// Sets the timestamp of the first generated record and the spacing
    /// between records.
    #[must_use]
    pub fn starting_at(mut self, start: DateTime<Utc>, step: Duration) -> Self {
        self.start = start;
        self.step = step;
        self
    }

    /// Generates a candidate event of type `event_type`.
    ///
    /// # Errors
    ///
    /// - `StoreError::UnknownEventType` if the type is not registered.
    /// - `StoreError::InvalidArgument` if the type cannot produce samples.
    /// - `StoreError::Validation` if a sample fails its own validator.
    pub fn candidate(&mut self, event_type: &str) -> Result<NewEvent, StoreError> {
        let registry = self.registry;
        let payload = registry
            .get(event_type)?
            .sample_payload(&mut self.rng)
            .ok_or_else(|| {
                StoreError::InvalidArgument(format!(
                    "event type {event_type} cannot generate sample payloads"
                ))
            })?;
        registry.validate(event_type, &payload)?;
        Ok(NewEvent::new(event_type, payload))
    }

    /// Generates one candidate per entry of `event_types`, in order.
    ///
    /// # Errors
    ///
    /// See [`candidate`](Self::candidate).
    pub fn candidates(&mut self, event_types: &[&str]) -> Result<Vec<NewEvent>, StoreError> {
        event_types.iter().map(|name| self.candidate(name)).collect()
    }

    /// Generates a persisted-looking history for `key`: one record per entry
    /// of `event_types`, numbered from 1.
    ///
    /// # Errors
    ///
    /// See [`candidate`](Self::candidate).
    pub fn history(
        &mut self,
        key: &AggregateKey,
        event_types: &[&str],
    ) -> Result<Vec<EventRecord>, StoreError> {
        let candidates = self.candidates(event_types)?;
        Ok((1..)
            .zip(candidates)
            .map(|(sequence_number, candidate)| self.stamp(key, sequence_number, candidate))
            .collect())
    }

    /// Generates `len` records whose types are drawn at random from the
    /// registered types that can produce samples.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if no registered type can
    /// produce samples, and otherwise the errors of
    /// [`candidate`](Self::candidate).
    pub fn random_history(
        &mut self,
        key: &AggregateKey,
        len: usize,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let registry = self.registry;
        let mut probe = SeededRng::new(0);
        let sampleable: Vec<&str> = registry
            .names()
            .into_iter()
            .filter(|name| {
                registry
                    .get(name)
                    .is_ok_and(|t| t.sample_payload(&mut probe).is_some())
            })
            .collect();
        if sampleable.is_empty() {
            return Err(StoreError::InvalidArgument(
                "no registered event type can generate sample payloads".to_owned(),
            ));
        }

        let max_index = u32::try_from(sampleable.len() - 1).unwrap_or(u32::MAX);
        let picks: Vec<&str> = (0..len)
            .map(|_| {
                let index = self.rng.next_u32_range(0, max_index);
                sampleable[usize::try_from(index).unwrap_or(0)]
            })
            .collect();
        self.history(key, &picks)
    }

    fn stamp(
        &mut self,
        key: &AggregateKey,
        sequence_number: i64,
        candidate: NewEvent,
    ) -> EventRecord {
        let offset = i32::try_from(sequence_number - 1).unwrap_or(i32::MAX);
        PendingEvent {
            event_id: self.next_uuid(),
            event_type: candidate.event_type,
            payload: candidate.payload,
            metadata: candidate.metadata,
            created_at: self.start + self.step * offset,
        }
        .into_record(key, sequence_number)
    }

    fn next_uuid(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        for chunk in bytes.chunks_mut(4) {
            chunk.copy_from_slice(&self.rng.next_u32_range(0, u32::MAX).to_le_bytes());
        }
        Builder::from_random_bytes(bytes).into_uuid()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use annals_core::schema::SchemaEventType;
    use annals_core::typed::TypedEventType;
    use serde_json::json;

    use super::*;

    fn registry() -> EventTypeRegistry {
        let mut registry = EventTypeRegistry::new();
        registry
            .register(Arc::new(
                SchemaEventType::new(
                    "AccountOpened",
                    json!({
                        "type": "object",
                        "properties": {"owner": {"type": "string", "minLength": 1}},
                        "required": ["owner"],
                        "additionalProperties": false
                    }),
                )
                .unwrap(),
            ))
            .unwrap();
        registry
            .register(Arc::new(
                SchemaEventType::new(
                    "FundsDeposited",
                    json!({
                        "type": "object",
                        "properties": {"amount": {"type": "number", "exclusiveMinimum": 0}},
                        "required": ["amount"]
                    }),
                )
                .unwrap(),
            ))
            .unwrap();
        registry
            .register(Arc::new(TypedEventType::<serde_json::Value>::new("Opaque")))
            .unwrap();
        registry
    }

    #[test]
    fn test_same_seed_same_history() {
        let registry = registry();
        let key = AggregateKey::new("acc-1", "account");

        let first = MockEventGenerator::new(&registry, 9)
            .history(&key, &["AccountOpened", "FundsDeposited", "FundsDeposited"])
            .unwrap();
        let second = MockEventGenerator::new(&registry, 9)
            .history(&key, &["AccountOpened", "FundsDeposited", "FundsDeposited"])
            .unwrap();

        assert_eq!(first, second);
        let seqs: Vec<i64> = first.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(first[1].created_at < first[2].created_at);
    }

    #[test]
    fn test_generated_payloads_validate() {
        let registry = registry();
        let key = AggregateKey::new("acc-1", "account");

        let history = MockEventGenerator::new(&registry, 1)
            .random_history(&key, 40)
            .unwrap();

        assert_eq!(history.len(), 40);
        for record in &history {
            assert_ne!(record.event_type, "Opaque");
            assert!(registry.validate(&record.event_type, &record.payload).is_ok());
        }
    }

    #[test]
    fn test_unsampleable_and_unknown_types_are_errors() {
        let registry = registry();
        let mut generator = MockEventGenerator::new(&registry, 1);

        assert!(matches!(
            generator.candidate("Opaque"),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            generator.candidate("Nope"),
            Err(StoreError::UnknownEventType(_))
        ));
    }
}
