//! Code-driven event types.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ValidationError, ValidationIssue};
use crate::event_type::EventType;
use crate::rng::DeterministicRng;

type Check<T> = Box<dyn Fn(&T) -> Result<(), ValidationIssue> + Send + Sync>;
type Sampler<T> = Box<dyn Fn(&mut dyn DeterministicRng) -> T + Send + Sync>;

/// An event type whose payload contract is a Rust type.
///
/// A payload is valid when it deserializes into `T` and every registered
/// check accepts the decoded value.
pub struct TypedEventType<T> {
    name: String,
    checks: Vec<Check<T>>,
    sampler: Option<Sampler<T>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> TypedEventType<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    /// Creates an event type that only requires the payload to decode as `T`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checks: Vec::new(),
            sampler: None,
            _payload: PhantomData,
        }
    }

    /// Adds a refinement run on the decoded payload.
    #[must_use]
    pub fn with_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), ValidationIssue> + Send + Sync + 'static,
    {
        self.checks.push(Box::new(check));
        self
    }

    /// Sets the generator used for fixture payloads.
    #[must_use]
    pub fn with_sampler<F>(mut self, sampler: F) -> Self
    where
        F: Fn(&mut dyn DeterministicRng) -> T + Send + Sync + 'static,
    {
        self.sampler = Some(Box::new(sampler));
        self
    }
}

impl<T> std::fmt::Debug for TypedEventType<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedEventType")
            .field("name", &self.name)
            .field("payload", &std::any::type_name::<T>())
            .field("checks", &self.checks.len())
            .field("has_sampler", &self.sampler.is_some())
            .finish()
    }
}

impl<T> EventType for TypedEventType<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, payload: &serde_json::Value) -> Result<(), ValidationError> {
        let decoded = T::deserialize(payload).map_err(|e| {
            ValidationError::single(self.name.clone(), "", e.to_string())
        })?;

        let issues: Vec<ValidationIssue> = self
            .checks
            .iter()
            .filter_map(|check| check(&decoded).err())
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                event_type: self.name.clone(),
                issues,
            })
        }
    }

    fn sample_payload(&self, rng: &mut dyn DeterministicRng) -> Option<serde_json::Value> {
        let sampler = self.sampler.as_ref()?;
        serde_json::to_value(sampler(rng)).ok()
    }
}
