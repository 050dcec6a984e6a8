//! Error taxonomy for the session engine.
//!
//! - [`ConfigError`]: bad user input, rejected before any state change.
//! - [`StorageError`]: log, counter, or segment I/O; callers recover by
//!   defaulting or ignoring.
//! - [`ParseError`]: a malformed persisted row; the row is dropped.
//! - [`StateError`]: an invalid transition; reported as a no-op.

use std::path::PathBuf;

/// Invalid configuration or user input.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Sampling interval was zero, negative, or not a number.
    #[error("interval must be a positive number, got {value}")]
    NonPositiveInterval { value: f64 },

    /// Unrecognized interval unit name.
    #[error("unknown interval unit '{0}' (expected seconds or minutes)")]
    UnknownIntervalUnit(String),

    /// Unrecognized time scale name.
    #[error("unknown time scale '{0}' (expected seconds, minutes or hours)")]
    UnknownTimeScale(String),

    /// A date that is not `YYYY-MM-DD`.
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Query start date lies after the end date.
    #[error("start date {start} is after end date {end}")]
    InvertedDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Query filter named no experiments.
    #[error("at least one experiment number is required")]
    EmptyExperimentFilter,

    /// Query filter text contained no experiment numbers.
    #[error("invalid experiment number format: '{0}'")]
    InvalidExperimentFilter(String),

    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::EngineConfig`].
    #[error("failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure reading or writing a durable file.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// A persisted row that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unparsable date '{0}'")]
    Date(String),

    #[error("unparsable timestamp '{date} {time}'")]
    Timestamp { date: String, time: String },

    #[error("no experiment number in label '{0}'")]
    ExperimentLabel(String),

    #[error("row has {found} fields, expected {expected}")]
    FieldCount { found: usize, expected: usize },
}

/// A transition requested from the wrong state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("an experiment is already running")]
    AlreadyRunning,

    #[error("no experiment is running")]
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages_name_the_input() {
        let e = ConfigError::NonPositiveInterval { value: -2.0 };
        assert!(e.to_string().contains("-2"));
        let e = ConfigError::InvalidExperimentFilter("abc".to_string());
        assert!(e.to_string().contains("abc"));
    }

    #[test]
    fn test_storage_error_carries_path() {
        let e = StorageError::io(
            "/tmp/x.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().contains("/tmp/x.csv"));
    }
}
