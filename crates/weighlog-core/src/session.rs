//! Experiment lifecycle state machine.
//!
//! An [`ExperimentSession`] is either idle or running one experiment. Starting
//! allocates the next id for today, clears the live history and begins
//! sampling; stopping commits the id to the daily counter. Every sample taken
//! while running lands in the history buffer, the durable log and the
//! experiment's segment file.
//!
//! The session owns its data source, clock, log and counter. It is driven by
//! a single thread (see [`crate::engine`]), so transitions never interleave.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::counter::DailyCounterStore;
use crate::error::{ConfigError, StateError};
use crate::history::{BufferSnapshot, HistoryBuffer};
use crate::record::PersistedRecord;
use crate::sample::Sample;
use crate::scale::{IntervalUnit, TimeScale, interval_from};
use crate::scheduler::SamplingScheduler;
use crate::segment::{SegmentEntry, create_segment};
use crate::source::TelemetrySource;
use crate::telemetry_log::TelemetryLog;

// ---------------------------------------------------------------------------
// State and transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Running,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Running => f.write_str("Running"),
        }
    }
}

/// What a lifecycle call actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started { id: u32 },
    Stopped { id: u32, silent: bool },
    Cleared,
    /// The calendar day changed. `stopped` is the experiment that was cut
    /// short, if any.
    RolledOver { stopped: Option<u32>, next_id: u32 },
    IntervalChanged { interval_ms: u64 },
    /// The call was not valid in the current state and changed nothing.
    Ignored(StateError),
}

/// Everything a presentation layer needs to draw the live view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Id of the running experiment.
    pub experiment_id: Option<u32>,
    pub last_completed: u32,
    pub next_experiment_id: u32,
    /// Calendar day the numbering belongs to.
    pub experiment_date: NaiveDate,
    pub started_at: Option<NaiveDateTime>,
    pub interval_ms: u64,
    pub time_scale: TimeScale,
    pub latest: Option<Sample>,
    pub difference: Option<f64>,
    pub buffer: BufferSnapshot,
    pub failed_writes: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct ExperimentSession {
    source: Box<dyn TelemetrySource>,
    clock: Box<dyn Clock>,
    log: TelemetryLog,
    counter: DailyCounterStore,
    segment_dir: PathBuf,

    state: SessionState,
    id: u32,
    last_completed: u32,
    last_reset_date: NaiveDate,
    started_at: Option<NaiveDateTime>,
    interval: Duration,
    scale: TimeScale,

    buffer: HistoryBuffer,
    scheduler: SamplingScheduler,
    latest: Option<Sample>,
    segment: Option<PathBuf>,
}

impl ExperimentSession {
    /// Build an idle session. The last completed id for today is resolved
    /// from the counter store immediately.
    pub fn new(
        source: Box<dyn TelemetrySource>,
        clock: Box<dyn Clock>,
        log: TelemetryLog,
        counter: DailyCounterStore,
        config: &EngineConfig,
    ) -> Self {
        let today = clock.today();
        let last_completed = counter.resolve(today);
        let interval = config.default_interval();
        let interval_ms = interval.as_millis() as u64;
        log::debug!(
            "session ready: source={}, last completed experiment for {today} is {last_completed}",
            source.name()
        );

        Self {
            source,
            clock,
            segment_dir: log.dir().to_path_buf(),
            log,
            counter,
            state: SessionState::Idle,
            id: 0,
            last_completed,
            last_reset_date: today,
            started_at: None,
            interval,
            scale: config.time_scale,
            buffer: HistoryBuffer::new(config.time_scale, interval_ms),
            scheduler: SamplingScheduler::new(interval),
            latest: None,
            segment: None,
        }
    }

    /// Convenience constructor wiring log and counter from `config`.
    pub fn from_config(
        source: Box<dyn TelemetrySource>,
        clock: Box<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            source,
            clock,
            config.telemetry_log(),
            config.counter_store(),
            config,
        )
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Begin a new experiment sampling every `value` `unit`s.
    ///
    /// A pending day change is applied first so the id is numbered for
    /// today. Callers that report rollovers run
    /// [`check_rollover`](Self::check_rollover) before this.
    pub fn start(&mut self, value: f64, unit: IntervalUnit) -> Result<Transition, ConfigError> {
        if self.state == SessionState::Running {
            return Ok(Transition::Ignored(StateError::AlreadyRunning));
        }
        let interval = interval_from(value, unit)?;
        self.check_rollover();

        let now = self.clock.now();
        let id = self.last_completed.saturating_add(1);
        self.id = id;
        self.started_at = Some(now);
        self.state = SessionState::Running;
        self.interval = interval;

        self.buffer.clear();
        self.buffer.set_interval(interval.as_millis() as u64);
        self.latest = None;

        self.segment = match create_segment(&self.segment_dir, self.last_reset_date, id) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("experiment {id}: segment file unavailable: {e}");
                None
            }
        };

        self.scheduler.set_interval(interval);
        self.scheduler.start(Instant::now());

        log::info!(
            "experiment {id} started at {} (interval {} ms)",
            now.format("%H:%M:%S"),
            interval.as_millis()
        );
        Ok(Transition::Started { id })
    }

    /// End the running experiment and commit its id to the daily counter.
    ///
    /// `silent` only affects logging and the presentation notice.
    pub fn stop(&mut self, silent: bool) -> Transition {
        if self.state != SessionState::Running {
            return Transition::Ignored(StateError::NotRunning);
        }
        self.scheduler.stop();
        self.segment = None;

        let id = self.id;
        if let Err(e) = self.counter.save(self.last_reset_date, id) {
            log::warn!("experiment {id}: could not save daily counter: {e}");
        }
        self.last_completed = id;
        self.state = SessionState::Idle;

        if silent {
            log::debug!("experiment {id} stopped");
        } else {
            log::info!("experiment {id} stopped after {} samples", self.buffer.len());
        }
        Transition::Stopped { id, silent }
    }

    /// Stop silently if running, then empty the live history.
    pub fn clear(&mut self) -> Transition {
        self.stop(true);
        self.buffer.clear();
        self.latest = None;
        self.started_at = None;
        Transition::Cleared
    }

    /// Handle a change of calendar day, if one happened.
    pub fn check_rollover(&mut self) -> Option<Transition> {
        let today = self.clock.today();
        if today == self.last_reset_date {
            return None;
        }
        Some(self.daily_rollover(today))
    }

    /// Stop any running experiment and restart numbering for `today`.
    pub fn daily_rollover(&mut self, today: NaiveDate) -> Transition {
        let stopped = match self.stop(true) {
            Transition::Stopped { id, .. } => Some(id),
            _ => None,
        };
        self.last_completed = self.counter.resolve(today);
        self.last_reset_date = today;
        let next_id = self.next_experiment_id();
        log::info!("day changed to {today}; next experiment is {next_id}");
        Transition::RolledOver { stopped, next_id }
    }

    /// Change the sampling interval. A running experiment keeps its id and
    /// history and continues at the new cadence.
    pub fn change_interval(
        &mut self,
        value: f64,
        unit: IntervalUnit,
    ) -> Result<Transition, ConfigError> {
        let interval = interval_from(value, unit)?;
        self.interval = interval;
        let interval_ms = interval.as_millis() as u64;
        self.buffer.set_interval(interval_ms);
        if self.state == SessionState::Running {
            self.scheduler.restart(interval, Instant::now());
        } else {
            self.scheduler.set_interval(interval);
        }
        log::debug!("sampling interval set to {interval_ms} ms");
        Ok(Transition::IntervalChanged { interval_ms })
    }

    pub fn change_time_scale(&mut self, scale: TimeScale) {
        self.scale = scale;
        self.buffer.rewindow(scale);
    }

    // -----------------------------------------------------------------------
    // Sampling
    // -----------------------------------------------------------------------

    /// Run one tick if the scheduler says one is due.
    pub fn tick_if_due(&mut self, now: Instant) -> Option<Sample> {
        if self.state != SessionState::Running || !self.scheduler.poll(now) {
            return None;
        }
        self.tick()
    }

    /// Take one sample now. Does nothing while idle.
    ///
    /// Samples always belong to the day the experiment was numbered for. Once
    /// the clock has crossed midnight no sample is taken until
    /// [`check_rollover`](Self::check_rollover) has run.
    pub fn tick(&mut self) -> Option<Sample> {
        if self.state != SessionState::Running {
            return None;
        }
        let previous = self.buffer.latest().copied();
        let mut captured_at = self.clock.now();
        if let Some(prev) = previous {
            if captured_at <= prev.captured_at {
                captured_at = prev.captured_at + TimeDelta::milliseconds(1);
            }
        }
        if captured_at.date() != self.last_reset_date {
            log::debug!(
                "experiment {}: tick at {captured_at} skipped, day rollover pending",
                self.id
            );
            return None;
        }

        let reading = self.source.next(true, self.id, previous.as_ref());
        let room_temp = self.source.room_temperature();

        let sample = Sample::new(captured_at, reading, room_temp);
        self.buffer.push(sample);

        let record = PersistedRecord::from_sample(&sample, self.id);
        let entry = self
            .segment
            .as_ref()
            .map(|path| SegmentEntry::for_sample(path.clone(), &sample));
        self.log.spawn_append(record, entry);

        self.latest = Some(sample);
        log::debug!(
            "experiment {} tick: w1={:.4} w2={:.4}",
            self.id,
            sample.weight_1,
            sample.weight_2
        );
        Some(sample)
    }

    /// Refresh the latest reading while idle. Nothing is buffered or
    /// persisted.
    pub fn preview(&mut self) -> Option<Sample> {
        if self.state == SessionState::Running {
            return None;
        }
        let reading = self.source.next(false, 0, self.latest.as_ref());
        let room_temp = self.source.room_temperature();
        let sample = Sample::new(self.clock.now(), reading, room_temp);
        self.latest = Some(sample);
        Some(sample)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        let buffer = match self.started_at {
            Some(origin) => self.buffer.snapshot(origin),
            None => BufferSnapshot::empty(self.scale),
        };
        SessionSnapshot {
            state: self.state,
            experiment_id: self.experiment_id(),
            last_completed: self.last_completed,
            next_experiment_id: self.next_experiment_id(),
            experiment_date: self.last_reset_date,
            started_at: self.started_at,
            interval_ms: self.interval.as_millis() as u64,
            time_scale: self.scale,
            latest: self.latest,
            difference: self.latest.map(|s| s.difference()),
            buffer,
            failed_writes: self.log.failed_writes(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Id of the running experiment.
    pub fn experiment_id(&self) -> Option<u32> {
        self.is_running().then_some(self.id)
    }

    pub fn last_completed(&self) -> u32 {
        self.last_completed
    }

    /// Id the next start will use.
    pub fn next_experiment_id(&self) -> u32 {
        self.last_completed.saturating_add(1)
    }

    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn time_scale(&self) -> TimeScale {
        self.scale
    }

    pub fn buffer(&self) -> &HistoryBuffer {
        &self.buffer
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    pub fn segment_path(&self) -> Option<&std::path::Path> {
        self.segment.as_deref()
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn log(&self) -> &TelemetryLog {
        &self.log
    }

    pub fn counter(&self) -> &DailyCounterStore {
        &self.counter
    }

    /// Time until the next tick, `None` while idle.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        if self.is_running() {
            self.scheduler.time_until_due(now)
        } else {
            None
        }
    }
}
