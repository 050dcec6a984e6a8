//! Durable append-only CSV log of every sample.
//!
//! Writes happen on short-lived background threads so a slow disk never
//! delays a tick. All writers share one lock around the append, so the
//! header is written exactly once and rows never interleave. Completion
//! order between threads is not guaranteed; readers sort by timestamp.
//!
//! # Format
//!
//! ```text
//! date,time,experiment,temp_1,temp_2,weight_1,weight_2,difference,room_temp
//! 2024-05-01,14:03:09,EXP_4,29.80,27.30,30.1500,15.1800,14.9700,0.00
//! ```

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::{ParseError, StorageError};
use crate::record::{HEADER, PersistedRecord};
use crate::segment::SegmentEntry;

/// Rows read back from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContents {
    pub records: Vec<PersistedRecord>,
    /// Rows skipped because they were partial or undecodable.
    pub dropped: usize,
}

#[derive(Debug)]
struct Shared {
    dir: PathBuf,
    path: PathBuf,
    write_lock: Mutex<()>,
    pending: Mutex<usize>,
    idle: Condvar,
    failed: AtomicU64,
}

/// Handle to the durable log. Clones share the same lock.
#[derive(Debug, Clone)]
pub struct TelemetryLog {
    shared: Arc<Shared>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl TelemetryLog {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self {
            shared: Arc::new(Shared {
                dir,
                path,
                write_lock: Mutex::new(()),
                pending: Mutex::new(0),
                idle: Condvar::new(),
                failed: AtomicU64::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Append one row synchronously.
    pub fn append(&self, record: &PersistedRecord) -> Result<(), StorageError> {
        let _guard = lock(&self.shared.write_lock);
        self.shared.append_locked(record)
    }

    /// Append one row (and optionally a segment line) on a background thread.
    ///
    /// Failures are logged and counted in [`failed_writes`](Self::failed_writes);
    /// nothing is reported back to the caller.
    pub fn spawn_append(&self, record: PersistedRecord, segment: Option<SegmentEntry>) {
        *lock(&self.shared.pending) += 1;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("weighlog-writer".to_string())
            .spawn(move || {
                shared.write_job(&record, segment.as_ref());
                shared.finish_one();
            });
        if let Err(e) = spawned {
            log::warn!("cannot spawn log writer: {e}; sample not persisted");
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
            self.shared.finish_one();
        }
    }

    /// Block until no background write is in flight or `timeout` elapses.
    /// Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = lock(&self.shared.pending);
        let (guard, _) = self
            .shared
            .idle
            .wait_timeout_while(guard, timeout, |n| *n > 0)
            .unwrap_or_else(|e| e.into_inner());
        *guard == 0
    }

    /// Background writes still in flight.
    pub fn pending_writes(&self) -> usize {
        *lock(&self.shared.pending)
    }

    /// Background writes that failed since this log was opened.
    pub fn failed_writes(&self) -> u64 {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// Read every well-formed row. A missing or empty file yields no rows.
    pub fn read_all(&self) -> Result<LogContents, StorageError> {
        let path = &self.shared.path;
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogContents::default()),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let mut contents = LogContents::default();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(StorageError::csv(path, e));
                }
                Err(e) => {
                    log::debug!("dropping undecodable row in {}: {e}", path.display());
                    contents.dropped += 1;
                    continue;
                }
            };
            match PersistedRecord::from_fields(row.iter()) {
                Ok(record) => contents.records.push(record),
                Err(ParseError::FieldCount { found, .. }) => {
                    log::debug!("dropping partial row with {found} fields in {}", path.display());
                    contents.dropped += 1;
                }
                Err(e) => {
                    log::debug!("dropping row in {}: {e}", path.display());
                    contents.dropped += 1;
                }
            }
        }
        Ok(contents)
    }
}

impl Shared {
    fn append_locked(&self, record: &PersistedRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer
                .write_record(HEADER)
                .map_err(|e| StorageError::csv(&self.path, e))?;
        }
        writer
            .write_record(record.fields())
            .map_err(|e| StorageError::csv(&self.path, e))?;
        writer.flush().map_err(|e| StorageError::io(&self.path, e))
    }

    fn write_job(&self, record: &PersistedRecord, segment: Option<&SegmentEntry>) {
        let _guard = lock(&self.write_lock);
        if let Err(e) = self.append_locked(record) {
            log::warn!("failed to append telemetry row: {e}");
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(entry) = segment {
            if let Err(e) = entry.append() {
                log::warn!("failed to append segment line: {e}");
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn finish_one(&self) {
        let mut pending = lock(&self.pending);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Reading, Sample};
    use chrono::{NaiveDate, TimeDelta};

    fn record(id: u32, secs: i64) -> PersistedRecord {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + TimeDelta::seconds(secs);
        let sample = Sample::new(
            at,
            Reading {
                temp_1: 29.8,
                temp_2: 27.3,
                weight_1: 30.0,
                weight_2: 15.0,
            },
            0.0,
        );
        PersistedRecord::from_sample(&sample, id)
    }

    // -----------------------------------------------------------------------
    // append
    // -----------------------------------------------------------------------

    #[test]
    fn test_first_append_writes_header() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path().join("Logs"), "records.csv");
        log.append(&record(1, 0)).unwrap();
        log.append(&record(1, 2)).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "2024-05-01,10:00:00,EXP_1,29.80,27.30,30.0000,15.0000,15.0000,0.00"
        );
    }

    #[test]
    fn test_empty_file_gets_header() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        fs::write(log.path(), "").unwrap();
        log.append(&record(1, 0)).unwrap();
        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.starts_with("date,time,experiment"));
    }

    // -----------------------------------------------------------------------
    // spawn_append
    // -----------------------------------------------------------------------

    #[test]
    fn test_concurrent_appends_one_header() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        for i in 0..50 {
            log.spawn_append(record(1, i), None);
        }
        assert!(log.wait_idle(Duration::from_secs(10)));
        assert_eq!(log.pending_writes(), 0);
        assert_eq!(log.failed_writes(), 0);

        let text = fs::read_to_string(log.path()).unwrap();
        let headers = text.lines().filter(|l| l.starts_with("date,")).count();
        assert_eq!(headers, 1);
        let contents = log.read_all().unwrap();
        assert_eq!(contents.records.len(), 50);
        assert_eq!(contents.dropped, 0);
    }

    #[test]
    fn test_spawn_append_writes_segment_line() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let seg = crate::segment::create_segment(tmp.path(), date, 1).unwrap();
        log.spawn_append(
            record(1, 0),
            Some(SegmentEntry {
                path: seg.clone(),
                line: "row".to_string(),
            }),
        );
        assert!(log.wait_idle(Duration::from_secs(5)));
        assert_eq!(fs::read_to_string(seg).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_failed_segment_is_counted() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        log.spawn_append(
            record(1, 0),
            Some(SegmentEntry {
                path: tmp.path().join("no-such-dir").join("seg.txt"),
                line: "row".to_string(),
            }),
        );
        assert!(log.wait_idle(Duration::from_secs(5)));
        assert_eq!(log.failed_writes(), 1);
        assert_eq!(log.read_all().unwrap().records.len(), 1);
    }

    #[test]
    fn test_wait_idle_with_nothing_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        assert!(log.wait_idle(Duration::from_millis(1)));
    }

    // -----------------------------------------------------------------------
    // read_all
    // -----------------------------------------------------------------------

    #[test]
    fn test_read_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        assert_eq!(log.read_all().unwrap(), LogContents::default());
    }

    #[test]
    fn test_read_drops_partial_last_row() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        log.append(&record(1, 0)).unwrap();
        let mut text = fs::read_to_string(log.path()).unwrap();
        text.push_str("2024-05-01,10:00:02,EXP_1,29.8");
        fs::write(log.path(), text).unwrap();

        let contents = log.read_all().unwrap();
        assert_eq!(contents.records.len(), 1);
        assert_eq!(contents.dropped, 1);
    }

    #[test]
    fn test_read_drops_invalid_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TelemetryLog::new(tmp.path(), "records.csv");
        log.append(&record(1, 0)).unwrap();
        let mut bytes = fs::read(log.path()).unwrap();
        bytes.extend_from_slice(b"2024-05-01,10:00:02,EXP_\xff,1,1,1,1,0,0\n");
        fs::write(log.path(), bytes).unwrap();

        let contents = log.read_all().unwrap();
        assert_eq!(contents.records.len(), 1);
        assert_eq!(contents.dropped, 1);
    }
}
