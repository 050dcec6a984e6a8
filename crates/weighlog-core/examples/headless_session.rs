//! Run a short experiment against the mock rig without any UI.
//!
//! Starts experiment N+1 for today, samples every 250 ms for three seconds,
//! stops, and queries the rows back from the durable log.
//!
//! Run: `cargo run --example headless_session`

use std::time::{Duration, Instant};

use weighlog_core::{
    Command, Engine, EngineConfig, ExperimentSession, HistoricalQuery, IntervalUnit, MockSource,
    Notice, QueryFilter, SystemClock,
};

fn main() {
    let dir = std::env::temp_dir().join("weighlog-demo");
    let config = EngineConfig {
        log_dir: dir.clone(),
        ..EngineConfig::default()
    };

    let session = ExperimentSession::from_config(
        Box::new(MockSource::new()),
        Box::new(SystemClock),
        &config,
    );
    let query = HistoricalQuery::new(config.telemetry_log());
    let handle = match Engine::new(session, query.clone(), &config).spawn() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("cannot start engine: {e}");
            return;
        }
    };

    handle.send(Command::Start {
        value: 0.25,
        unit: IntervalUnit::Seconds,
    });

    let mut experiment = None;
    let until = Instant::now() + Duration::from_secs(3);
    while Instant::now() < until {
        let Ok(snap) = handle.snapshots().recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        if let Some(Notice::Started { id }) = snap.notice {
            println!("experiment {id} started, logging to {}", dir.display());
            experiment = Some(id);
        }
        if let (Some(latest), Some(diff)) = (snap.session.latest, snap.session.difference) {
            println!(
                "  {}  w1={:.4} kg  w2={:.4} kg  diff={:.4} kg",
                latest.captured_at.format("%H:%M:%S%.3f"),
                latest.weight_1,
                latest.weight_2,
                diff
            );
        }
    }

    let Some(session) = handle.shutdown() else {
        return;
    };
    let Some(id) = experiment else {
        println!("experiment never started");
        return;
    };

    let today = session.last_reset_date();
    match QueryFilter::new(today, today, [id]).map(|f| query.filter(&f)) {
        Ok(Ok(result)) => println!("\n{} rows persisted for EXP_{id}", result.len()),
        Ok(Err(e)) => eprintln!("query failed: {e}"),
        Err(e) => eprintln!("bad filter: {e}"),
    }
}
