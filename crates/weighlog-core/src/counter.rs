//! Calendar-day experiment counter.
//!
//! The counter file holds a single line `YYYY-MM-DD,<id>`: the last
//! experiment completed on that date. It is overwritten atomically on every
//! stop. When it is missing, stale, or unreadable, the last id is recovered
//! by scanning the log directory for today's experiment segments.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use regex::RegexBuilder;
use tempfile::NamedTempFile;

use crate::error::StorageError;
use crate::record::DATE_FORMAT;

/// Outcome of reading the counter file.
#[derive(Debug)]
pub enum CounterLoad {
    /// The file holds an id for the requested date.
    Found(u32),
    /// Missing, dated another day, or malformed.
    NotFound,
    /// The file exists but could not be read.
    IoFailure(io::Error),
}

/// Persistent per-day experiment counter.
#[derive(Debug, Clone)]
pub struct DailyCounterStore {
    dir: PathBuf,
    path: PathBuf,
}

impl DailyCounterStore {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the counter with `(date, id)`.
    pub fn save(&self, date: NaiveDate, id: u32) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        let tmp_path = tmp.path().to_path_buf();
        write!(tmp, "{},{}", date.format(DATE_FORMAT), id).map_err(|e| StorageError::io(&tmp_path, e))?;
        tmp.flush().map_err(|e| StorageError::io(&tmp_path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::io(&self.path, e.error))?;
        Ok(())
    }

    /// Read the stored id if it belongs to `today`.
    pub fn load(&self, today: NaiveDate) -> CounterLoad {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return CounterLoad::NotFound,
            Err(e) => return CounterLoad::IoFailure(e),
        };
        match parse_counter_line(&text) {
            Some((date, id)) if date == today => CounterLoad::Found(id),
            Some(_) => CounterLoad::NotFound,
            None => {
                log::debug!("ignoring malformed counter file {}", self.path.display());
                CounterLoad::NotFound
            }
        }
    }

    /// Highest `<today>_EXP_<n>.txt` in the log directory, or 0.
    pub fn scan_fallback(&self, today: NaiveDate) -> u32 {
        let date = today.format(DATE_FORMAT).to_string();
        let pattern = format!(r"^{}_EXP_(\d+)\.txt$", regex::escape(&date));
        let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                log::warn!("invalid segment pattern {pattern}: {e}");
                return 0;
            }
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("cannot list {}: {e}", self.dir.display());
                }
                return 0;
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                re.captures(name)?.get(1)?.as_str().parse::<u32>().ok()
            })
            .max()
            .unwrap_or(0)
    }

    /// Last completed experiment id for `today`.
    pub fn resolve(&self, today: NaiveDate) -> u32 {
        match self.load(today) {
            CounterLoad::Found(id) => id,
            CounterLoad::NotFound => self.scan_fallback(today),
            CounterLoad::IoFailure(e) => {
                log::warn!(
                    "cannot read counter file {}: {e}; scanning log directory",
                    self.path.display()
                );
                self.scan_fallback(today)
            }
        }
    }
}

fn parse_counter_line(text: &str) -> Option<(NaiveDate, u32)> {
    let parts: Vec<&str> = text.trim().split(',').collect();
    let [date, id] = parts.as_slice() else {
        return None;
    };
    let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
    let id = id.trim().parse().ok()?;
    Some((date, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn store(dir: &Path) -> DailyCounterStore {
        DailyCounterStore::new(dir, "last_exp.txt")
    }

    // -----------------------------------------------------------------------
    // save / load
    // -----------------------------------------------------------------------

    #[test]
    fn test_save_then_load_same_day() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(tmp.path());
        s.save(day(1), 7).unwrap();
        assert!(matches!(s.load(day(1)), CounterLoad::Found(7)));
        let text = fs::read_to_string(s.path()).unwrap();
        assert_eq!(text, "2024-05-01,7");
    }

    #[test]
    fn test_load_other_day_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(tmp.path());
        s.save(day(1), 7).unwrap();
        assert!(matches!(s.load(day(2)), CounterLoad::NotFound));
    }

    #[test]
    fn test_save_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(tmp.path());
        s.save(day(1), 3).unwrap();
        s.save(day(1), 4).unwrap();
        assert!(matches!(s.load(day(1)), CounterLoad::Found(4)));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(store(tmp.path()).load(day(1)), CounterLoad::NotFound));
    }

    #[test]
    fn test_malformed_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(tmp.path());
        for bad in ["", "2024-05-01", "2024-05-01,x", "2024-05-01,1,2", "yesterday,4"] {
            fs::write(s.path(), bad).unwrap();
            assert!(matches!(s.load(day(1)), CounterLoad::NotFound), "{bad:?}");
        }
    }

    #[test]
    fn test_trailing_newline_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(tmp.path());
        fs::write(s.path(), "2024-05-01, 9\n").unwrap();
        assert!(matches!(s.load(day(1)), CounterLoad::Found(9)));
    }

    #[test]
    fn test_unreadable_file_is_io_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(tmp.path());
        // A directory where the file should be cannot be read as text.
        fs::create_dir(s.path()).unwrap();
        assert!(matches!(s.load(day(1)), CounterLoad::IoFailure(_)));
        assert_eq!(s.resolve(day(1)), 0);
    }

    // -----------------------------------------------------------------------
    // scan fallback
    // -----------------------------------------------------------------------

    #[test]
    fn test_scan_picks_maximum_for_today() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "2024-05-01_EXP_3.txt",
            "2024-05-01_EXP_5.txt",
            "2024-05-01_EXP_2.txt",
            "2024-04-30_EXP_9.txt",
            "2024-05-01_EXP_11.csv",
            "notes.txt",
        ] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        let s = store(tmp.path());
        assert_eq!(s.scan_fallback(day(1)), 5);
        assert_eq!(s.resolve(day(1)), 5);
    }

    #[test]
    fn test_scan_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2024-05-01_exp_4.TXT"), "").unwrap();
        assert_eq!(store(tmp.path()).scan_fallback(day(1)), 4);
    }

    #[test]
    fn test_scan_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let s = store(&tmp.path().join("absent"));
        assert_eq!(s.scan_fallback(day(1)), 0);
        assert_eq!(s.resolve(day(1)), 0);
    }

    #[test]
    fn test_resolve_prefers_counter_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2024-05-01_EXP_9.txt"), "").unwrap();
        let s = store(tmp.path());
        s.save(day(1), 2).unwrap();
        assert_eq!(s.resolve(day(1)), 2);
    }

    #[test]
    fn test_resolve_stale_counter_scans() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2024-05-02_EXP_6.txt"), "").unwrap();
        let s = store(tmp.path());
        s.save(day(1), 2).unwrap();
        assert_eq!(s.resolve(day(2)), 6);
    }
}
