//! The event type capability.
//!
//! An event type is a name bound to a payload validator. The registry and the
//! store only ever see `dyn EventType`; whether validation is driven by a
//! schema document ([`SchemaEventType`](crate::schema::SchemaEventType)) or by
//! Rust code ([`TypedEventType`](crate::typed::TypedEventType)) is decided at
//! registration time and opaque afterwards.

use crate::error::ValidationError;
use crate::rng::DeterministicRng;

/// A named payload contract.
pub trait EventType: Send + Sync + std::fmt::Debug {
    /// Unique name of the event type.
    fn name(&self) -> &str;

    /// Checks `payload` against the contract.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming every violation found.
    fn validate(&self, payload: &serde_json::Value) -> Result<(), ValidationError>;

    /// Produces a payload that passes [`validate`](Self::validate), drawing
    /// randomness from `rng`. Returns `None` when the event type cannot
    /// generate samples.
    fn sample_payload(&self, _rng: &mut dyn DeterministicRng) -> Option<serde_json::Value> {
        None
    }
}
