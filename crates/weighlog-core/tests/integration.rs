//! Integration tests for weighlog-core.
//!
//! These tests drive the public API end to end:
//! session lifecycle → durable log → daily counter → historical queries.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, TimeDelta};
use weighlog_core::{
    Command, CounterLoad, DailyCounterStore, Engine, EngineConfig, ExperimentSession,
    HistoricalQuery, IntervalUnit, ManualClock, MockSource, Notice, PersistedRecord, QueryFilter,
    Reading, Sample, SessionState, TelemetryLog, TimeScale, Transition,
};

fn may(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

/// Route core logging to the test harness; `RUST_LOG=debug` shows it.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config_for(dir: &Path) -> EngineConfig {
    init_logging();
    EngineConfig {
        log_dir: dir.to_path_buf(),
        idle_preview: false,
        idle_poll_ms: 20,
        ..EngineConfig::default()
    }
}

fn session(dir: &Path, clock: &ManualClock) -> ExperimentSession {
    ExperimentSession::from_config(
        Box::new(MockSource::seeded(5)),
        Box::new(clock.clone()),
        &config_for(dir),
    )
}

fn record(day: u32, hms: (u32, u32, u32), id: u32) -> PersistedRecord {
    let at = may(day).and_hms_opt(hms.0, hms.1, hms.2).unwrap();
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

// ---------------------------------------------------------------------------
// Daily counter
// ---------------------------------------------------------------------------

#[test]
fn restart_continues_numbering() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DailyCounterStore::new(tmp.path(), "last_exp.txt");
    store.save(may(1), 7).unwrap();

    // A fresh store on the same directory simulates a process restart.
    let reopened = DailyCounterStore::new(tmp.path(), "last_exp.txt");
    assert!(matches!(reopened.load(may(1)), CounterLoad::Found(7)));

    let clock = ManualClock::new(may(1).and_hms_opt(12, 0, 0).unwrap());
    let mut s = session(tmp.path(), &clock);
    assert_eq!(
        s.start(2.0, IntervalUnit::Seconds).unwrap(),
        Transition::Started { id: 8 }
    );
}

#[test]
fn scan_fallback_finds_highest_segment() {
    let tmp = tempfile::tempdir().unwrap();
    for id in [3, 5, 2] {
        fs::write(tmp.path().join(format!("2024-05-01_EXP_{id}.txt")), "").unwrap();
    }
    let store = DailyCounterStore::new(tmp.path(), "last_exp.txt");
    assert!(matches!(store.load(may(1)), CounterLoad::NotFound));
    assert_eq!(store.scan_fallback(may(1)), 5);
    assert_eq!(store.resolve(may(1)), 5);
}

#[test]
fn counter_for_other_day_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DailyCounterStore::new(tmp.path(), "last_exp.txt");
    store.save(may(1), 3).unwrap();
    for d in [2, 3, 30] {
        assert!(matches!(store.load(may(d)), CounterLoad::NotFound));
    }
}

#[test]
fn segments_written_by_sessions_feed_the_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(may(1).and_hms_opt(8, 0, 0).unwrap());
    let mut s = session(tmp.path(), &clock);
    for _ in 0..3 {
        s.start(1.0, IntervalUnit::Seconds).unwrap();
        s.tick();
        s.stop(true);
    }
    assert!(s.log().wait_idle(Duration::from_secs(5)));

    // Losing the counter file falls back to the segment names.
    fs::remove_file(s.counter().path()).unwrap();
    assert_eq!(s.counter().resolve(may(1)), 3);
}

// ---------------------------------------------------------------------------
// Durable log
// ---------------------------------------------------------------------------

#[test]
fn concurrent_appends_are_all_persisted() {
    let tmp = tempfile::tempdir().unwrap();
    let log = TelemetryLog::new(tmp.path(), "experiment_records.csv");

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let log = log.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    log.spawn_append(record(1, (10, w, i), 1), None);
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }
    assert!(log.wait_idle(Duration::from_secs(10)));

    let text = fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 201);
    assert_eq!(lines.iter().filter(|l| l.starts_with("date,")).count(), 1);
    assert!(lines[1..].iter().all(|l| l.split(',').count() == 9));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[test]
fn query_selects_requested_experiments() {
    let tmp = tempfile::tempdir().unwrap();
    let log = TelemetryLog::new(tmp.path(), "experiment_records.csv");
    log.append(&record(1, (10, 0, 0), 1)).unwrap();
    log.append(&record(1, (10, 0, 2), 3)).unwrap();

    let query = HistoricalQuery::new(log);
    let filter = QueryFilter::new(may(1), may(2), [1, 2]).unwrap();
    let result = query.filter(&filter).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.records[0].experiment, "EXP_1");
}

#[test]
fn query_round_trips_session_samples() {
    let tmp = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(may(1).and_hms_opt(9, 0, 0).unwrap());
    let mut s = session(tmp.path(), &clock);
    s.start(2.0, IntervalUnit::Seconds).unwrap();
    let mut taken = Vec::new();
    for _ in 0..10 {
        taken.push(s.tick().unwrap());
        clock.advance(TimeDelta::seconds(2));
    }
    s.stop(false);
    assert!(s.log().wait_idle(Duration::from_secs(5)));

    let query = HistoricalQuery::new(s.log().clone());
    let result = query
        .filter(&QueryFilter::parse("2024-05-01", "2024-05-01", "1").unwrap())
        .unwrap();
    let expected: Vec<PersistedRecord> = taken
        .iter()
        .map(|sample| PersistedRecord::from_sample(sample, 1))
        .collect();
    assert_eq!(result.records, expected);

    let again = query
        .filter(&QueryFilter::parse("2024-05-01", "2024-05-01", "1").unwrap())
        .unwrap();
    assert_eq!(again, result);

    let series = result.series(TimeScale::Seconds, 2_000);
    assert_eq!(series.points.len(), 10);
    assert_eq!(series.points[9].elapsed, 18.0);
}

// ---------------------------------------------------------------------------
// History buffer through the session
// ---------------------------------------------------------------------------

#[test]
fn forty_ticks_keep_thirty_one_samples() {
    let tmp = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(may(1).and_hms_opt(9, 0, 0).unwrap());
    let mut s = session(tmp.path(), &clock);
    s.start(2.0, IntervalUnit::Seconds).unwrap();
    for _ in 0..40 {
        s.tick();
        clock.advance(TimeDelta::seconds(2));
    }
    assert_eq!(s.buffer().capacity(), 31);
    assert_eq!(s.buffer().len(), 31);
    let snap = s.snapshot();
    assert_eq!(snap.buffer.bounds.x, [78.0 - 60.0, 78.0]);
    s.stop(true);
    assert!(s.log().wait_idle(Duration::from_secs(5)));
    assert_eq!(s.log().read_all().unwrap().records.len(), 40);
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[test]
fn engine_round_trip_via_commands() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_for(tmp.path());
    let clock = ManualClock::new(may(1).and_hms_opt(9, 0, 0).unwrap());
    let session = ExperimentSession::from_config(
        Box::new(MockSource::seeded(9)),
        Box::new(clock.clone()),
        &config,
    );
    let handle = Engine::new(session, HistoricalQuery::new(config.telemetry_log()), &config)
        .spawn()
        .unwrap();

    handle.send(Command::ChangeTimeScale(TimeScale::Minutes));
    handle.send(Command::Start {
        value: 0.02,
        unit: IntervalUnit::Seconds,
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut started = false;
    let mut points = 0;
    while Instant::now() < deadline && points < 5 {
        if let Ok(snap) = handle.snapshots().recv_timeout(Duration::from_millis(100)) {
            started |= snap.notice == Some(Notice::Started { id: 1 });
            if started {
                assert_eq!(snap.session.time_scale, TimeScale::Minutes);
                points = snap.session.buffer.points.len();
            }
        }
    }
    assert!(started);
    assert!(points >= 5);

    let session = handle.shutdown().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(matches!(session.counter().load(may(1)), CounterLoad::Found(1)));
    assert_eq!(session.log().pending_writes(), 0);
}
