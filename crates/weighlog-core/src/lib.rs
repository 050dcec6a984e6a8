//! # weighlog-core
//!
//! **Experiment telemetry for a two-cylinder weighing rig.**
//!
//! `weighlog-core` runs the experiment lifecycle: it samples two temperatures
//! and two weights on a fixed cadence, keeps a time-windowed history for live
//! charts, appends every sample to a durable CSV log, and numbers experiments
//! per calendar day across restarts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use weighlog_core::{
//!     Command, Engine, EngineConfig, ExperimentSession, HistoricalQuery, IntervalUnit,
//!     MockSource, SystemClock,
//! };
//!
//! let config = EngineConfig::default();
//! let session = ExperimentSession::from_config(
//!     Box::new(MockSource::new()),
//!     Box::new(SystemClock),
//!     &config,
//! );
//! let query = HistoricalQuery::new(config.telemetry_log());
//! let handle = Engine::new(session, query, &config).spawn().unwrap();
//!
//! handle.send(Command::Start { value: 2.0, unit: IntervalUnit::Seconds });
//! for snapshot in handle.snapshots().iter().take(5) {
//!     println!("{:?}", snapshot.session.latest);
//! }
//! handle.shutdown();
//! ```
//!
//! ## Architecture
//!
//! Commands → Engine thread → ExperimentSession → (HistoryBuffer, TelemetryLog)
//!
//! - The engine owns the session and applies commands between ticks.
//! - Each tick reads the [`TelemetrySource`], pushes into the
//!   [`HistoryBuffer`] and hands the durable write to a background thread.
//! - Stopping an experiment commits its id to the [`DailyCounterStore`].
//! - [`HistoricalQuery`] reads the log independently of the writers.

pub mod clock;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod history;
pub mod query;
pub mod record;
pub mod sample;
pub mod scale;
pub mod scheduler;
pub mod segment;
pub mod session;
pub mod source;
pub mod telemetry_log;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use counter::{CounterLoad, DailyCounterStore};
pub use engine::{Command, Engine, EngineHandle, EngineSnapshot, HistoryView, Notice};
pub use error::{ConfigError, ParseError, StateError, StorageError};
pub use history::{AxisBounds, BufferSnapshot, HistoryBuffer, SeriesPoint, capacity};
pub use query::{HistoricalQuery, HistoricalReading, QueryFilter, QueryResult};
pub use record::{HEADER, PersistedRecord, experiment_label};
pub use sample::{Reading, Sample};
pub use scale::{IntervalUnit, TimeScale, interval_from};
pub use scheduler::SamplingScheduler;
pub use segment::{SegmentEntry, create_segment, segment_path};
pub use session::{ExperimentSession, SessionSnapshot, SessionState, Transition};
pub use source::{MockSource, TelemetrySource};
pub use telemetry_log::{LogContents, TelemetryLog};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
