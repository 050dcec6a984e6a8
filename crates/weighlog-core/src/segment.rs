//! Per-experiment segment files.
//!
//! Each experiment gets `<YYYY-MM-DD>_EXP_<id>.txt` in the log directory:
//! a header line, then one line per sample with a millisecond timestamp.
//! The daily counter's fallback scan discovers experiments through these
//! names.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::StorageError;
use crate::record::DATE_FORMAT;
use crate::sample::Sample;

pub const SEGMENT_HEADER: &str = "Timestamp,Temp1(C),Temp2(C),Weight1(kg),Weight2(kg)";
pub const SEGMENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// `<dir>/<date>_EXP_<id>.txt`.
pub fn segment_path(dir: &Path, date: NaiveDate, id: u32) -> PathBuf {
    dir.join(format!("{}_EXP_{}.txt", date.format(DATE_FORMAT), id))
}

/// Create (or truncate) the segment for experiment `id` and write its header.
pub fn create_segment(dir: &Path, date: NaiveDate, id: u32) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    let path = segment_path(dir, date, id);
    let mut file = File::create(&path).map_err(|e| StorageError::io(&path, e))?;
    writeln!(file, "{SEGMENT_HEADER}").map_err(|e| StorageError::io(&path, e))?;
    Ok(path)
}

/// One pending segment line and the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub path: PathBuf,
    pub line: String,
}

impl SegmentEntry {
    pub fn for_sample(path: PathBuf, sample: &Sample) -> Self {
        let line = format!(
            "{},{:.2},{:.2},{:.4},{:.4}",
            sample.captured_at.format(SEGMENT_TIMESTAMP_FORMAT),
            sample.temp_1,
            sample.temp_2,
            sample.weight_1,
            sample.weight_2,
        );
        Self { path, line }
    }

    /// Append the line. The segment must already exist.
    pub fn append(&self) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;
        writeln!(file, "{}", self.line).map_err(|e| StorageError::io(&self.path, e))
    }
}
