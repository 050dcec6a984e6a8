//! Telemetry source trait and the mock rig.
//!
//! Every data source implements [`TelemetrySource`]. The session owns exactly
//! one source, handed to it at construction; swapping the mock for real
//! hardware never touches session logic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sample::{Reading, Sample};

/// Trait that every telemetry source must implement.
pub trait TelemetrySource: Send {
    /// Short identifier (e.g. `"mock"`).
    fn name(&self) -> &str;

    /// Produce the next reading.
    ///
    /// `previous` is the last sample buffered in the current session, if any.
    fn next(&mut self, running: bool, session_id: u32, previous: Option<&Sample>) -> Reading;

    /// Ambient temperature, if the rig has a room sensor.
    fn room_temperature(&mut self) -> f64 {
        0.0
    }
}

pub const MOCK_TEMP_1: f64 = 29.8;
pub const MOCK_TEMP_2: f64 = 27.3;
pub const MOCK_WEIGHT_1: f64 = 30.15;
pub const MOCK_WEIGHT_2: f64 = 15.18;

/// Per-tick weight loss bounds (kg) for the two cylinders.
const WEIGHT_1_DRAIN: (f64, f64) = (0.001, 0.005);
const WEIGHT_2_DRAIN: (f64, f64) = (0.0005, 0.002);

/// Simulated rig: constant temperatures, two slowly draining weights.
pub struct MockSource {
    rng: StdRng,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic mock for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn next(&mut self, running: bool, _session_id: u32, previous: Option<&Sample>) -> Reading {
        let (weight_1, weight_2) = match previous {
            Some(prev) if running => (
                prev.weight_1 - self.rng.random_range(WEIGHT_1_DRAIN.0..WEIGHT_1_DRAIN.1),
                prev.weight_2 - self.rng.random_range(WEIGHT_2_DRAIN.0..WEIGHT_2_DRAIN.1),
            ),
            _ => (MOCK_WEIGHT_1, MOCK_WEIGHT_2),
        };

        Reading {
            temp_1: MOCK_TEMP_1,
            temp_2: MOCK_TEMP_2,
            weight_1,
            weight_2,
        }
    }
}
