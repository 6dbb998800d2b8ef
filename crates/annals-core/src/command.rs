//! Command abstractions.

use uuid::Uuid;

/// Trait for commands that end in an append. Handlers log the command type
/// and stamp the correlation id into event metadata.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the events it produces.
    fn correlation_id(&self) -> Uuid;

    /// Metadata to attach to every event produced by this command.
    fn event_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "command_type": self.command_type(),
            "correlation_id": self.correlation_id(),
        })
    }
}
