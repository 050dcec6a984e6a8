//! `weighlog monitor`: live dashboard.

use weighlog_core::EngineConfig;

use super::{parse_unit, start_engine};

pub fn run(config: &EngineConfig, interval: f64, unit: &str) {
    let unit = parse_unit(unit);
    if let Err(e) = weighlog_core::interval_from(interval, unit) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let handle = start_engine(config, None);
    let mut app = crate::tui::app::App::new(handle, interval, unit);
    let result = app.run();

    if let Some(session) = app.into_handle().shutdown() {
        let last = session.last_completed();
        if last > 0 {
            println!("Last experiment today: EXP_{last}  ({})", session.log().path().display());
        }
    }

    if let Err(e) = result {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
