//! TUI application state and event loop.
//!
//! The app holds no session state of its own: keys become engine commands,
//! and every frame renders the newest snapshot the engine has published.

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use weighlog_core::{
    BufferSnapshot, Command, ConfigError, EngineHandle, EngineSnapshot, IntervalUnit, Notice,
    QueryFilter, SessionSnapshot, SessionState,
};

/// How long a status message stays on screen.
const STATUS_TTL: Duration = Duration::from_secs(6);

pub struct App {
    handle: EngineHandle,
    running: bool,
    interval: f64,
    unit: IntervalUnit,
    snapshot: Option<EngineSnapshot>,
    status: Option<(String, Instant)>,
}

impl App {
    pub fn new(handle: EngineHandle, interval: f64, unit: IntervalUnit) -> Self {
        Self {
            handle,
            running: true,
            interval,
            unit,
            snapshot: None,
            status: None,
        }
    }

    pub fn into_handle(self) -> EngineHandle {
        self.handle
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            self.drain_snapshots();
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    fn drain_snapshots(&mut self) {
        for snap in self.handle.snapshots().try_iter() {
            if let Some(notice) = &snap.notice {
                self.status = Some((notice_text(notice), Instant::now()));
            }
            self.snapshot = Some(snap);
        }
        if self
            .status
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() > STATUS_TTL)
        {
            self.status = None;
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('s') => self.send(Command::Start {
                value: self.interval,
                unit: self.unit,
            }),
            KeyCode::Char('x') => self.send(Command::Stop),
            KeyCode::Char('c') => self.send(Command::Clear),
            KeyCode::Char('t') => {
                let scale = self.snapshot.as_ref().map(|s| s.session.time_scale).unwrap_or_default();
                self.send(Command::ChangeTimeScale(scale.next()));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.interval = step_interval(self.interval, true);
                self.send(Command::ChangeInterval {
                    value: self.interval,
                    unit: self.unit,
                });
            }
            KeyCode::Char('-') => {
                self.interval = step_interval(self.interval, false);
                self.send(Command::ChangeInterval {
                    value: self.interval,
                    unit: self.unit,
                });
            }
            KeyCode::Char('h') => self.query_today(),
            _ => {}
        }
    }

    /// Load today's most recent experiment from the durable log.
    fn query_today(&mut self) {
        let Some(snap) = &self.snapshot else {
            return;
        };
        match latest_experiment_filter(&snap.session) {
            Ok(Some(filter)) => self.send(Command::Query(filter)),
            Ok(None) => {
                self.status = Some(("No experiment recorded today".to_string(), Instant::now()))
            }
            Err(e) => self.status = Some((e.to_string(), Instant::now())),
        }
    }

    fn send(&mut self, command: Command) {
        if !self.handle.send(command) {
            self.status = Some(("Engine stopped".to_string(), Instant::now()));
            self.running = false;
        }
    }

    // -----------------------------------------------------------------------
    // Accessors for the renderer
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Option<&EngineSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|(s, _)| s.as_str())
    }

    pub fn interval_label(&self) -> String {
        format!("{} {}", self.interval, self.unit)
    }

    pub fn is_recording(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| s.session.state == SessionState::Running)
    }

    /// Series to chart: a loaded query result, else the live buffer.
    pub fn chart_series(&self) -> Option<(&BufferSnapshot, bool)> {
        let snap = self.snapshot.as_ref()?;
        Some(match &snap.history {
            Some(view) => (&view.series, true),
            None => (&snap.session.buffer, false),
        })
    }
}

/// One-line text for a notice.
pub fn notice_text(notice: &Notice) -> String {
    match notice {
        Notice::Started { id } => format!("Experiment EXP_{id} started"),
        Notice::Stopped { id } => format!("Experiment EXP_{id} stopped"),
        Notice::RolledOver { next_id } => {
            format!("New day: numbering restarted, next is EXP_{next_id}")
        }
        Notice::InvalidInput(msg) => format!("Invalid input: {msg}"),
        Notice::QueryLoaded { rows } => format!("Loaded {rows} row(s) from the log"),
        Notice::NoData => "No data found for the selected range and experiments".to_string(),
        Notice::QueryFailed(msg) => format!("Query failed: {msg}"),
    }
}

/// Filter for the running or last completed experiment, on the day the
/// engine numbered it for. `None` when nothing was recorded that day.
pub fn latest_experiment_filter(
    session: &SessionSnapshot,
) -> Result<Option<QueryFilter>, ConfigError> {
    let id = session.experiment_id.unwrap_or(session.last_completed);
    if id == 0 {
        return Ok(None);
    }
    let day = session.experiment_date;
    QueryFilter::new(day, day, [id]).map(Some)
}

/// Next interval value for `+`/`-`: whole steps of one unit, halving below one.
pub fn step_interval(current: f64, up: bool) -> f64 {
    if up {
        if current < 1.0 { current * 2.0 } else { current.floor() + 1.0 }
    } else if current > 1.0 {
        (current.ceil() - 1.0).max(1.0)
    } else {
        (current / 2.0).max(0.125)
    }
}
