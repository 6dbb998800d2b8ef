//! Deterministic `DeterministicRng` implementations for tests.

use annals_core::rng::DeterministicRng;

/// A no-op RNG that always returns `min` for `next_u32_range` and `0.0` for
/// `next_f64`. Samples drawn through it sit on their lower bounds.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }

    fn next_f64(&mut self) -> f64 {
        0.0
    }
}

/// An RNG that replays a predetermined sequence, clamped into the requested
/// range and cycling when exhausted. Used when a test needs to pick a
/// specific enum variant or length.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }

    fn next_raw(&mut self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        let val = self.values[self.index % self.values.len()];
        self.index += 1;
        val
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        self.next_raw().clamp(min, max.max(min))
    }

    fn next_f64(&mut self) -> f64 {
        f64::from(self.next_raw() % 100) / 100.0
    }
}
