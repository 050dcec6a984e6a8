//! Persisted row format for the durable log.
//!
//! Every field is stored as text so the file stays readable in a spreadsheet.
//! Rows are written once and never rewritten; readers parse what they need.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::sample::Sample;

/// Column names of the durable log, in order.
pub const HEADER: [&str; 9] = [
    "date",
    "time",
    "experiment",
    "temp_1",
    "temp_2",
    "weight_1",
    "weight_2",
    "difference",
    "room_temp",
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

static EXPERIMENT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

/// One row of the durable log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub date: String,
    pub time: String,
    pub experiment: String,
    pub temp_1: String,
    pub temp_2: String,
    pub weight_1: String,
    pub weight_2: String,
    pub difference: String,
    pub room_temp: String,
}

impl PersistedRecord {
    /// Encode a sample taken during experiment `experiment_id`.
    pub fn from_sample(sample: &Sample, experiment_id: u32) -> Self {
        Self {
            date: sample.captured_at.format(DATE_FORMAT).to_string(),
            time: sample.captured_at.format(TIME_FORMAT).to_string(),
            experiment: experiment_label(experiment_id),
            temp_1: format!("{:.2}", sample.temp_1),
            temp_2: format!("{:.2}", sample.temp_2),
            weight_1: format!("{:.4}", sample.weight_1),
            weight_2: format!("{:.4}", sample.weight_2),
            difference: format!("{:.4}", sample.difference()),
            room_temp: format!("{:.2}", sample.room_temp),
        }
    }

    /// First integer in the experiment label (`"EXP_12"` -> 12).
    pub fn experiment_number(&self) -> Result<u32, ParseError> {
        EXPERIMENT_NUMBER
            .find(&self.experiment)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| ParseError::ExperimentLabel(self.experiment.clone()))
    }

    pub fn calendar_date(&self) -> Result<NaiveDate, ParseError> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT)
            .map_err(|_| ParseError::Date(self.date.clone()))
    }

    /// Combined date and time. Fractional seconds are accepted.
    pub fn timestamp(&self) -> Result<NaiveDateTime, ParseError> {
        let date = self.calendar_date()?;
        let time = self.time.trim();
        NaiveTime::parse_from_str(time, TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S%.f"))
            .map(|t| date.and_time(t))
            .map_err(|_| ParseError::Timestamp {
                date: self.date.clone(),
                time: self.time.clone(),
            })
    }

    /// Build from raw CSV fields, which must number exactly [`HEADER`]`.len()`.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().collect();
        let [date, time, experiment, temp_1, temp_2, weight_1, weight_2, difference, room_temp] =
            fields.as_slice()
        else {
            return Err(ParseError::FieldCount {
                found: fields.len(),
                expected: HEADER.len(),
            });
        };
        Ok(Self {
            date: date.to_string(),
            time: time.to_string(),
            experiment: experiment.to_string(),
            temp_1: temp_1.to_string(),
            temp_2: temp_2.to_string(),
            weight_1: weight_1.to_string(),
            weight_2: weight_2.to_string(),
            difference: difference.to_string(),
            room_temp: room_temp.to_string(),
        })
    }

    pub(crate) fn fields(&self) -> [&str; 9] {
        [
            &self.date,
            &self.time,
            &self.experiment,
            &self.temp_1,
            &self.temp_2,
            &self.weight_1,
            &self.weight_2,
            &self.difference,
            &self.room_temp,
        ]
    }
}

/// `EXP_<id>`.
pub fn experiment_label(id: u32) -> String {
    format!("EXP_{id}")
}
