pub mod counter;
pub mod monitor;
pub mod query;
pub mod record;

use std::path::{Path, PathBuf};
use std::time::Duration;

use weighlog_core::{
    Engine, EngineConfig, EngineHandle, ExperimentSession, HistoricalQuery, IntervalUnit,
    MockSource, SystemClock, TimeScale,
};

/// Load the config file (if any) and apply the `--log-dir` override.
pub fn load_config(path: Option<&Path>, log_dir: Option<PathBuf>) -> EngineConfig {
    let mut config = match path {
        Some(p) => EngineConfig::from_file(p).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if let Some(dir) = log_dir {
        config.log_dir = dir;
    }
    config
}

/// Build a session over the mock rig and start the control engine.
pub fn start_engine(config: &EngineConfig, seed: Option<u64>) -> EngineHandle {
    let source = match seed {
        Some(seed) => MockSource::seeded(seed),
        None => MockSource::new(),
    };
    let session = ExperimentSession::from_config(Box::new(source), Box::new(SystemClock), config);
    let query = HistoricalQuery::new(config.telemetry_log());
    Engine::new(session, query, config)
        .spawn()
        .unwrap_or_else(|e| {
            eprintln!("Error starting engine: {e}");
            std::process::exit(1);
        })
}

/// Parse an interval unit name, exiting on error.
pub fn parse_unit(s: &str) -> IntervalUnit {
    s.parse().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    })
}

/// Parse a time scale name, exiting on error.
pub fn parse_scale(s: &str) -> TimeScale {
    s.parse().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    })
}

/// Parse a duration string like "5m", "30s", "1h", "100ms".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        // Assume seconds
        (s, 1000)
    };

    let value: u64 = numeric.trim().parse().ok()?;
    Some(Duration::from_millis(value.checked_mul(multiplier)?))
}
