//! Shared test doubles and fixture generation for the Annals event store.

mod clock;
mod mock_events;
mod rng;
mod storage;

pub use clock::{FixedClock, SteppingClock};
pub use mock_events::MockEventGenerator;
pub use rng::{MockRng, SequenceRng};
pub use storage::{
    ConflictingStorageAdapter, FailingStorageAdapter, RecordedAppend, RecordingStorageAdapter,
};
