//! Event type registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::event_type::EventType;

/// Maps event type names to their validators.
///
/// Each `EventStore` owns its own registry; there is no process-wide table.
/// Registration takes `&mut self`, so the registry is filled before the store
/// is shared and read concurrently afterwards.
#[derive(Debug, Default, Clone)]
pub struct EventTypeRegistry {
    types: HashMap<String, Arc<dyn EventType>>,
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event type.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateEventType` if the name is taken; the
    /// existing registration is kept.
    pub fn register(&mut self, event_type: Arc<dyn EventType>) -> Result<(), StoreError> {
        let name = event_type.name().to_owned();
        if self.types.contains_key(&name) {
            return Err(StoreError::DuplicateEventType(name));
        }
        tracing::debug!(event_type = %name, "registered event type");
        self.types.insert(name, event_type);
        Ok(())
    }

    /// Looks up an event type by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownEventType` if the name was never registered.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn EventType>, StoreError> {
        self.types
            .get(name)
            .ok_or_else(|| StoreError::UnknownEventType(name.to_owned()))
    }

    /// Validates `payload` with the event type called `name`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownEventType`, or `StoreError::Validation`
    /// carrying the validator's issues unchanged.
    pub fn validate(&self, name: &str, payload: &serde_json::Value) -> Result<(), StoreError> {
        self.get(name)?.validate(payload)?;
        Ok(())
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ValidationIssue;
    use crate::schema::SchemaEventType;

    fn owner_required(name: &str) -> Arc<dyn EventType> {
        Arc::new(
            SchemaEventType::new(
                name,
                json!({"type": "object", "required": ["owner"]}),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_register_and_get() {
        // Arrange
        let mut registry = EventTypeRegistry::new();

        // Act
        registry.register(owner_required("AccountOpened")).unwrap();

        // Assert
        assert_eq!(registry.get("AccountOpened").unwrap().name(), "AccountOpened");
        assert_eq!(registry.names(), vec!["AccountOpened"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = EventTypeRegistry::new();
        registry.register(owner_required("AccountOpened")).unwrap();

        let result = registry.register(owner_required("AccountOpened"));

        match result {
            Err(StoreError::DuplicateEventType(name)) => assert_eq!(name, "AccountOpened"),
            other => panic!("expected DuplicateEventType, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let registry = EventTypeRegistry::new();

        match registry.validate("Nope", &json!({})) {
            Err(StoreError::UnknownEventType(name)) => assert_eq!(name, "Nope"),
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_error_surfaces_unchanged() {
        let mut registry = EventTypeRegistry::new();
        registry.register(owner_required("AccountOpened")).unwrap();

        match registry.validate("AccountOpened", &json!({})) {
            Err(StoreError::Validation(err)) => {
                assert_eq!(err.event_type, "AccountOpened");
                assert_eq!(err.issues, vec![ValidationIssue::new("/owner", "is required")]);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_registries_are_independent() {
        let mut first = EventTypeRegistry::new();
        let second = EventTypeRegistry::new();

        first.register(owner_required("AccountOpened")).unwrap();

        assert!(first.contains("AccountOpened"));
        assert!(!second.contains("AccountOpened"));
        assert!(second.is_empty());
    }
}
