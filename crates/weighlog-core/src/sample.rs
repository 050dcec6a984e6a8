//! In-memory telemetry samples.

use chrono::NaiveDateTime;
use serde::Serialize;

/// One reading as produced by a [`crate::TelemetrySource`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub temp_1: f64,
    pub temp_2: f64,
    pub weight_1: f64,
    pub weight_2: f64,
}

/// A time-stamped reading captured during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub captured_at: NaiveDateTime,
    pub temp_1: f64,
    pub temp_2: f64,
    pub weight_1: f64,
    pub weight_2: f64,
    pub room_temp: f64,
}

impl Sample {
    pub fn new(captured_at: NaiveDateTime, reading: Reading, room_temp: f64) -> Self {
        Self {
            captured_at,
            temp_1: reading.temp_1,
            temp_2: reading.temp_2,
            weight_1: reading.weight_1,
            weight_2: reading.weight_2,
            room_temp,
        }
    }

    /// `weight_1 - weight_2`.
    pub fn difference(&self) -> f64 {
        self.weight_1 - self.weight_2
    }

    /// Seconds elapsed since `origin`, millisecond resolution.
    pub fn elapsed_secs(&self, origin: NaiveDateTime) -> f64 {
        (self.captured_at - origin).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_difference() {
        let reading = Reading {
            temp_1: 29.8,
            temp_2: 27.3,
            weight_1: 30.15,
            weight_2: 15.18,
        };
        let s = Sample::new(at(10, 0, 0), reading, 0.0);
        assert!((s.difference() - 14.97).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_secs() {
        let reading = Reading {
            temp_1: 0.0,
            temp_2: 0.0,
            weight_1: 0.0,
            weight_2: 0.0,
        };
        let origin = at(10, 0, 0);
        let s = Sample::new(origin + TimeDelta::milliseconds(2_500), reading, 0.0);
        assert!((s.elapsed_secs(origin) - 2.5).abs() < 1e-9);
    }
}
