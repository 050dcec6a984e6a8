//! Historical range/id queries against the durable log.
//!
//! Queries read the whole log without taking the write lock. Rows that are
//! partial, undatable, or carry no experiment number are skipped. Matches
//! are returned in timestamp order, which reconstructs the sampling order
//! even when background writers finished out of order.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::error::{ConfigError, StorageError};
use crate::history::{BufferSnapshot, SeriesPoint, capacity};
use crate::record::{DATE_FORMAT, PersistedRecord};
use crate::scale::TimeScale;
use crate::telemetry_log::TelemetryLog;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

/// Inclusive date range plus a set of experiment ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    start: NaiveDate,
    end: NaiveDate,
    ids: BTreeSet<u32>,
}

impl QueryFilter {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        ids: impl IntoIterator<Item = u32>,
    ) -> Result<Self, ConfigError> {
        let ids: BTreeSet<u32> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(ConfigError::EmptyExperimentFilter);
        }
        if start > end {
            return Err(ConfigError::InvertedDateRange { start, end });
        }
        Ok(Self { start, end, ids })
    }

    /// Parse user text: two `YYYY-MM-DD` dates and a list of ids.
    ///
    /// Ids are every run of digits in `ids_text`, so `"1, 3 7"` and
    /// `"EXP_1;EXP_3"` both work.
    pub fn parse(start_text: &str, end_text: &str, ids_text: &str) -> Result<Self, ConfigError> {
        let start = parse_date(start_text)?;
        let end = parse_date(end_text)?;

        if ids_text.trim().is_empty() {
            return Err(ConfigError::EmptyExperimentFilter);
        }
        let ids: Vec<u32> = DIGIT_RUN
            .find_iter(ids_text)
            .map(|m| m.as_str().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::InvalidExperimentFilter(ids_text.to_string()))?;
        if ids.is_empty() {
            return Err(ConfigError::InvalidExperimentFilter(ids_text.to_string()));
        }
        Self::new(start, end, ids)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn ids(&self) -> &BTreeSet<u32> {
        &self.ids
    }

    fn matches(&self, date: NaiveDate, id: u32) -> bool {
        date >= self.start && date <= self.end && self.ids.contains(&id)
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|_| ConfigError::InvalidDate(text.to_string()))
}

/// Numeric view of one persisted row. Unparsable fields are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalReading {
    pub timestamp: Option<NaiveDateTime>,
    pub experiment: String,
    pub temp_1: Option<f64>,
    pub temp_2: Option<f64>,
    pub weight_1: Option<f64>,
    pub weight_2: Option<f64>,
    pub difference: Option<f64>,
    pub room_temp: Option<f64>,
}

impl HistoricalReading {
    pub fn from_record(record: &PersistedRecord) -> Self {
        let weight_1 = parse_number(&record.weight_1);
        let weight_2 = parse_number(&record.weight_2);
        let difference = parse_number(&record.difference).or(match (weight_1, weight_2) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        });
        Self {
            timestamp: record.timestamp().ok(),
            experiment: record.experiment.clone(),
            temp_1: parse_number(&record.temp_1),
            temp_2: parse_number(&record.temp_2),
            weight_1,
            weight_2,
            difference,
            room_temp: parse_number(&record.room_temp),
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Matching rows in ascending timestamp order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub records: Vec<PersistedRecord>,
    /// Rows skipped while reading or interpreting the log.
    pub dropped: usize,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// The last matching row, decoded.
    pub fn latest(&self) -> Option<HistoricalReading> {
        self.records.last().map(HistoricalReading::from_record)
    }

    /// Chart series for the trailing rows that fit `scale` at `interval_ms`.
    ///
    /// Elapsed time is measured from the first plotted row. Missing weights
    /// take the nearest earlier value, or the first later one at the start.
    pub fn series(&self, scale: TimeScale, interval_ms: u64) -> BufferSnapshot {
        let keep = capacity(scale, interval_ms);
        let skip = self.records.len().saturating_sub(keep);
        let rows: Vec<(NaiveDateTime, Option<f64>, Option<f64>)> = self.records[skip..]
            .iter()
            .filter_map(|r| {
                let ts = r.timestamp().ok()?;
                Some((ts, parse_number(&r.weight_1), parse_number(&r.weight_2)))
            })
            .collect();

        let Some(&(origin, _, _)) = rows.first() else {
            return BufferSnapshot::empty(scale);
        };

        let w1 = fill_gaps(rows.iter().map(|r| r.1));
        let w2 = fill_gaps(rows.iter().map(|r| r.2));
        let points = rows
            .iter()
            .zip(w1.into_iter().zip(w2))
            .map(|(&(ts, _, _), (weight_1, weight_2))| SeriesPoint {
                elapsed: scale.to_units((ts - origin).num_milliseconds() as f64 / 1000.0),
                weight_1,
                weight_2,
            })
            .collect();
        BufferSnapshot::windowed(scale, points)
    }
}

/// Forward-fill, then back-fill leading gaps; 0.0 if no value at all.
fn fill_gaps(values: impl Iterator<Item = Option<f64>>) -> Vec<f64> {
    let values: Vec<Option<f64>> = values.collect();
    let first = values.iter().flatten().next().copied().unwrap_or(0.0);
    let mut last = first;
    values
        .into_iter()
        .map(|v| {
            if let Some(v) = v {
                last = v;
            }
            last
        })
        .collect()
}

/// Read path over a [`TelemetryLog`].
#[derive(Debug, Clone)]
pub struct HistoricalQuery {
    log: TelemetryLog,
}

impl HistoricalQuery {
    pub fn new(log: TelemetryLog) -> Self {
        Self { log }
    }

    /// All rows matching `filter`, ascending by timestamp.
    pub fn filter(&self, filter: &QueryFilter) -> Result<QueryResult, StorageError> {
        let contents = self.log.read_all()?;
        let mut dropped = contents.dropped;
        let mut matched: Vec<(NaiveDateTime, PersistedRecord)> = Vec::new();

        for record in contents.records {
            let Ok(id) = record.experiment_number() else {
                continue;
            };
            let date = match record.calendar_date() {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("skipping row: {e}");
                    dropped += 1;
                    continue;
                }
            };
            if !filter.matches(date, id) {
                continue;
            }
            match record.timestamp() {
                Ok(ts) => matched.push((ts, record)),
                Err(e) => {
                    log::debug!("skipping row: {e}");
                    dropped += 1;
                }
            }
        }

        matched.sort_by_key(|(ts, _)| *ts);
        Ok(QueryResult {
            records: matched.into_iter().map(|(_, r)| r).collect(),
            dropped,
        })
    }
}
