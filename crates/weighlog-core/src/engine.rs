//! Control engine: one thread that owns the session.
//!
//! Presentation code never touches [`ExperimentSession`] directly. It sends
//! [`Command`]s through an [`EngineHandle`] and renders the
//! [`EngineSnapshot`]s the engine publishes after every tick, transition and
//! query. The engine sleeps on its command channel until the next tick is
//! due, so commands are applied promptly and only ever between ticks.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::history::BufferSnapshot;
use crate::query::{HistoricalQuery, HistoricalReading, QueryFilter, QueryResult};
use crate::record::PersistedRecord;
use crate::scale::{IntervalUnit, TimeScale};
use crate::session::{ExperimentSession, SessionSnapshot, Transition};

/// Snapshots buffered for a slow subscriber before old ones are discarded.
const SNAPSHOT_BACKLOG: usize = 64;
/// How long shutdown waits for in-flight log writes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests from the presentation layer.
#[derive(Debug, Clone)]
pub enum Command {
    Start { value: f64, unit: IntervalUnit },
    Stop,
    Clear,
    ChangeTimeScale(TimeScale),
    ChangeInterval { value: f64, unit: IntervalUnit },
    Query(QueryFilter),
    Shutdown,
}

/// One-shot, user-facing message attached to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Notice {
    Started { id: u32 },
    Stopped { id: u32 },
    RolledOver { next_id: u32 },
    InvalidInput(String),
    QueryLoaded { rows: usize },
    NoData,
    QueryFailed(String),
}

/// A query result prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub records: Vec<PersistedRecord>,
    pub latest: Option<HistoricalReading>,
    pub series: BufferSnapshot,
}

impl HistoryView {
    fn build(result: &QueryResult, scale: TimeScale, interval_ms: u64) -> Self {
        Self {
            records: result.records.clone(),
            latest: result.latest(),
            series: result.series(scale, interval_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub session: SessionSnapshot,
    pub notice: Option<Notice>,
    /// Present while the engine shows a query result instead of live data.
    pub history: Option<HistoryView>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    session: ExperimentSession,
    query: HistoricalQuery,
    idle_preview: bool,
    idle_poll: Duration,

    snapshots_tx: Sender<EngineSnapshot>,
    snapshots_rx: Receiver<EngineSnapshot>,

    history: Option<(QueryResult, HistoryView)>,
    next_preview: Instant,
}

impl Engine {
    pub fn new(session: ExperimentSession, query: HistoricalQuery, config: &EngineConfig) -> Self {
        let (snapshots_tx, snapshots_rx) = crossbeam_channel::bounded(SNAPSHOT_BACKLOG);
        Self {
            session,
            query,
            idle_preview: config.idle_preview,
            idle_poll: config.idle_poll(),
            snapshots_tx,
            snapshots_rx,
            history: None,
            next_preview: Instant::now(),
        }
    }

    /// Run the engine on its own thread.
    ///
    /// The returned handle holds the only command sender: dropping it without
    /// calling [`EngineHandle::shutdown`] stops the engine the same way.
    pub fn spawn(self) -> std::io::Result<EngineHandle> {
        let (commands, commands_rx) = crossbeam_channel::unbounded();
        let snapshots = self.snapshots_rx.clone();
        let thread = thread::Builder::new()
            .name("weighlog-engine".to_string())
            .spawn(move || self.run(commands_rx))?;
        Ok(EngineHandle {
            commands,
            snapshots,
            thread,
        })
    }

    fn run(mut self, commands: Receiver<Command>) -> ExperimentSession {
        log::debug!("engine started (source {})", self.session.source_name());
        self.publish(None);

        loop {
            let wait = self.next_wait(Instant::now());
            let command = match commands.recv_timeout(wait) {
                Ok(Command::Shutdown) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("engine handle dropped without shutdown");
                    break;
                }
                Ok(cmd) => Some(cmd),
                Err(RecvTimeoutError::Timeout) => None,
            };

            // The day may have changed while waiting.
            if let Some(t) = self.session.check_rollover() {
                self.on_transition(t);
            }
            if let Some(cmd) = command {
                self.apply(cmd);
            }

            let now = Instant::now();
            if self.session.tick_if_due(now).is_some() {
                self.publish(None);
            } else if self.idle_preview && !self.session.is_running() && now >= self.next_preview {
                self.session.preview();
                self.next_preview = now + self.idle_poll;
                self.publish(None);
            }
        }

        self.session.stop(true);
        if !self.session.log().wait_idle(SHUTDOWN_GRACE) {
            log::warn!(
                "{} log write(s) still pending at shutdown",
                self.session.log().pending_writes()
            );
        }
        log::debug!("engine stopped");
        self.session
    }

    fn next_wait(&self, now: Instant) -> Duration {
        let mut wait = self.idle_poll;
        if let Some(due) = self.session.time_until_due(now) {
            wait = wait.min(due);
        } else if self.idle_preview {
            wait = wait.min(self.next_preview.saturating_duration_since(now));
        }
        wait
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start { value, unit } => {
                self.history = None;
                match self.session.start(value, unit) {
                    Ok(t) => self.on_transition(t),
                    Err(e) => self.publish(Some(Notice::InvalidInput(e.to_string()))),
                }
            }
            Command::Stop => {
                self.history = None;
                let t = self.session.stop(false);
                self.on_transition(t);
            }
            Command::Clear => {
                self.history = None;
                let t = self.session.clear();
                self.on_transition(t);
            }
            Command::ChangeTimeScale(scale) => {
                self.session.change_time_scale(scale);
                self.refresh_history();
                self.publish(None);
            }
            Command::ChangeInterval { value, unit } => {
                match self.session.change_interval(value, unit) {
                    Ok(t) => {
                        self.refresh_history();
                        self.on_transition(t);
                    }
                    Err(e) => self.publish(Some(Notice::InvalidInput(e.to_string()))),
                }
            }
            Command::Query(filter) => self.run_query(&filter),
            Command::Shutdown => {}
        }
    }

    fn run_query(&mut self, filter: &QueryFilter) {
        match self.query.filter(filter) {
            Ok(result) if result.is_empty() => {
                log::info!(
                    "no rows for experiments {:?} between {} and {}",
                    filter.ids(),
                    filter.start(),
                    filter.end()
                );
                self.publish(Some(Notice::NoData));
            }
            Ok(result) => {
                let rows = result.len();
                log::info!("query loaded {rows} row(s), {} dropped", result.dropped);
                let view = HistoryView::build(
                    &result,
                    self.session.time_scale(),
                    self.session.interval().as_millis() as u64,
                );
                self.history = Some((result, view));
                self.publish(Some(Notice::QueryLoaded { rows }));
            }
            Err(e) => {
                log::warn!("query failed: {e}");
                self.publish(Some(Notice::QueryFailed(e.to_string())));
            }
        }
    }

    fn refresh_history(&mut self) {
        let scale = self.session.time_scale();
        let interval_ms = self.session.interval().as_millis() as u64;
        if let Some((result, view)) = self.history.as_mut() {
            *view = HistoryView::build(result, scale, interval_ms);
        }
    }

    fn on_transition(&mut self, transition: Transition) {
        let notice = match transition {
            Transition::Started { id } => Some(Notice::Started { id }),
            Transition::Stopped { id, silent: false } => Some(Notice::Stopped { id }),
            Transition::RolledOver { next_id, .. } => {
                self.history = None;
                Some(Notice::RolledOver { next_id })
            }
            Transition::Ignored(reason) => {
                log::debug!("command ignored: {reason}");
                None
            }
            Transition::Stopped { .. } | Transition::Cleared | Transition::IntervalChanged { .. } => {
                None
            }
        };
        self.publish(notice);
    }

    fn publish(&self, notice: Option<Notice>) {
        let mut snapshot = EngineSnapshot {
            session: self.session.snapshot(),
            notice,
            history: self.history.as_ref().map(|(_, view)| view.clone()),
        };
        loop {
            match self.snapshots_tx.try_send(snapshot) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(back)) => {
                    // Make room by discarding the oldest snapshot.
                    let _ = self.snapshots_rx.try_recv();
                    snapshot = back;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Presentation-side end of a running engine.
pub struct EngineHandle {
    commands: Sender<Command>,
    snapshots: Receiver<EngineSnapshot>,
    thread: JoinHandle<ExperimentSession>,
}

impl EngineHandle {
    /// Queue a command. Returns `false` if the engine has exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshots(&self) -> &Receiver<EngineSnapshot> {
        &self.snapshots
    }

    /// Most recent snapshot currently queued, discarding older ones.
    pub fn latest_snapshot(&self) -> Option<EngineSnapshot> {
        self.snapshots.try_iter().last()
    }

    /// Stop the engine (silently stopping any running experiment), wait for
    /// pending writes and hand the session back.
    pub fn shutdown(self) -> Option<ExperimentSession> {
        let _ = self.commands.send(Command::Shutdown);
        match self.thread.join() {
            Ok(session) => Some(session),
            Err(_) => {
                log::error!("engine thread panicked");
                None
            }
        }
    }
}
