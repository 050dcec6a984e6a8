//! `weighlog record`: run one experiment without the dashboard.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use weighlog_core::{
    Command, EngineConfig, HistoricalQuery, Notice, QueryFilter, SessionState, segment_path,
};

use super::{parse_duration, parse_scale, parse_unit, start_engine};

pub struct RecordCommandConfig<'a> {
    pub config: &'a EngineConfig,
    pub interval: f64,
    pub unit: &'a str,
    pub duration: Option<&'a str>,
    pub scale: Option<&'a str>,
    pub seed: Option<u64>,
}

/// Run the record command.
pub fn run(cmd: RecordCommandConfig<'_>) {
    let unit = parse_unit(cmd.unit);
    let max_duration = cmd.duration.map(|d| {
        parse_duration(d).unwrap_or_else(|| {
            eprintln!("Invalid duration: {d}");
            std::process::exit(1);
        })
    });

    // Validate before spinning up the engine so bad input never touches disk.
    if let Err(e) = weighlog_core::interval_from(cmd.interval, unit) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: cannot install Ctrl+C handler: {e}");
    }

    let handle = start_engine(cmd.config, cmd.seed);
    if let Some(scale) = cmd.scale {
        handle.send(Command::ChangeTimeScale(parse_scale(scale)));
    }
    handle.send(Command::Start {
        value: cmd.interval,
        unit,
    });

    println!("Recording experiment");
    println!("  Interval:  {} {unit}", cmd.interval);
    match max_duration {
        Some(d) => println!("  Duration:  {}s", d.as_secs()),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!("  Log dir:   {}", cmd.config.log_dir.display());
    println!();

    let start = Instant::now();
    let mut experiment = None;
    let mut failed = 0u64;

    while running.load(Ordering::SeqCst) {
        if let Some(max) = max_duration {
            if start.elapsed() >= max {
                break;
            }
        }

        let Ok(snap) = handle.snapshots().recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        match &snap.notice {
            Some(Notice::Started { id }) => {
                let day = snap.session.started_at.map(|t| t.date());
                experiment = day.map(|d| (*id, d));
                println!("  Experiment EXP_{id} started");
            }
            Some(Notice::InvalidInput(msg)) => {
                eprintln!("Error: {msg}");
                running.store(false, Ordering::SeqCst);
            }
            Some(Notice::RolledOver { next_id }) => {
                println!("\n  Day changed; experiment stopped (next is EXP_{next_id})");
                running.store(false, Ordering::SeqCst);
            }
            _ => {}
        }
        if snap.session.state != SessionState::Running {
            continue;
        }

        failed = snap.session.failed_writes;
        if let (Some(latest), Some(diff)) = (snap.session.latest, snap.session.difference) {
            print!(
                "\r  {}  W1 {:>9.4} kg  W2 {:>9.4} kg  Δ {:>9.4} kg  T1 {:.2}°C  T2 {:.2}°C",
                latest.captured_at.format("%H:%M:%S"),
                latest.weight_1,
                latest.weight_2,
                diff,
                latest.temp_1,
                latest.temp_2,
            );
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
    }

    println!();
    println!();

    let Some(session) = handle.shutdown() else {
        eprintln!("Error: engine stopped unexpectedly");
        std::process::exit(1);
    };
    let failed = failed.max(session.log().failed_writes());

    match experiment {
        Some((id, day)) => {
            let rows = QueryFilter::new(day, day, [id])
                .ok()
                .and_then(|f| HistoricalQuery::new(session.log().clone()).filter(&f).ok())
                .map_or(0, |r| r.len());
            println!("Experiment EXP_{id} saved");
            println!("  Samples:   {rows}");
            println!("  Elapsed:   {:.1}s", start.elapsed().as_secs_f64());
            println!("  Log:       {}", session.log().path().display());
            println!(
                "  Segment:   {}",
                segment_path(session.log().dir(), day, id).display()
            );
        }
        None => println!("No experiment was started."),
    }

    if failed > 0 {
        eprintln!("Warning: {failed} write(s) failed; see log output.");
        std::process::exit(1);
    }
}
