//! Display time scales and sampling interval units.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How much history the live chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeScale {
    /// Last 60 seconds.
    #[default]
    Seconds,
    /// Last 60 minutes.
    Minutes,
    /// Last 24 hours.
    Hours,
}

impl TimeScale {
    pub const ALL: [TimeScale; 3] = [Self::Seconds, Self::Minutes, Self::Hours];

    /// Window length expressed in the scale's own unit (60, 60, 24).
    pub fn window(self) -> f64 {
        match self {
            Self::Seconds | Self::Minutes => 60.0,
            Self::Hours => 24.0,
        }
    }

    /// Window length in seconds.
    pub fn window_seconds(self) -> u64 {
        match self {
            Self::Seconds => 60,
            Self::Minutes => 60 * 60,
            Self::Hours => 24 * 60 * 60,
        }
    }

    /// Seconds per display unit.
    pub fn divisor(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }

    /// Lowercase unit label for axis titles.
    pub fn unit_label(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
        }
    }

    /// Convert elapsed seconds into this scale's unit.
    pub fn to_units(self, elapsed_secs: f64) -> f64 {
        elapsed_secs / self.divisor()
    }

    /// Next scale in display order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Seconds => Self::Minutes,
            Self::Minutes => Self::Hours,
            Self::Hours => Self::Seconds,
        }
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit_label())
    }
}

impl FromStr for TimeScale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "s" => Ok(Self::Seconds),
            "minutes" | "minute" | "m" => Ok(Self::Minutes),
            "hours" | "hour" | "h" => Ok(Self::Hours),
            _ => Err(ConfigError::UnknownTimeScale(s.to_string())),
        }
    }
}

/// Unit of the user-entered sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Seconds,
    Minutes,
}

impl IntervalUnit {
    fn millis_per_unit(self) -> f64 {
        match self {
            Self::Seconds => 1_000.0,
            Self::Minutes => 60_000.0,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds => f.write_str("seconds"),
            Self::Minutes => f.write_str("minutes"),
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "s" | "sec" => Ok(Self::Seconds),
            "minutes" | "minute" | "m" | "min" => Ok(Self::Minutes),
            _ => Err(ConfigError::UnknownIntervalUnit(s.to_string())),
        }
    }
}

/// Convert a user-entered interval into a positive duration.
///
/// Rejects non-finite and non-positive values, and values so small they
/// truncate to zero milliseconds.
pub fn interval_from(value: f64, unit: IntervalUnit) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositiveInterval { value });
    }
    let ms = (value * unit.millis_per_unit()) as u64;
    if ms == 0 {
        return Err(ConfigError::NonPositiveInterval { value });
    }
    Ok(Duration::from_millis(ms))
}
