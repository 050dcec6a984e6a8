//! `weighlog counter`: how today's experiment number is resolved.

use chrono::Local;
use weighlog_core::{CounterLoad, EngineConfig};

/// Run the counter command.
pub fn run(config: &EngineConfig) {
    let store = config.counter_store();
    let today = Local::now().date_naive();

    println!("Counter file: {}", store.path().display());
    println!("Date:         {today}");

    let stored = match store.load(today) {
        CounterLoad::Found(id) => {
            println!("Stored:       EXP_{id}");
            Some(id)
        }
        CounterLoad::NotFound => {
            println!("Stored:       none for today");
            None
        }
        CounterLoad::IoFailure(e) => {
            eprintln!("Stored:       unreadable ({e})");
            None
        }
    };

    let scanned = store.scan_fallback(today);
    println!("Scanned:      EXP_{scanned} (highest segment in {})", store.dir().display());

    let last = stored.unwrap_or(scanned);
    println!("Next:         EXP_{}", last.saturating_add(1));
}
